// src/matching/rules.rs
//
// Ordered heuristics that decide whether one provider candidate matches the
// source company. Each rule looks at a single candidate and returns a verdict;
// the resolver folds the verdicts across all candidates.

use std::collections::HashSet;

use crate::matching::domain::initials;

/// What a single rule concluded about one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleVerdict {
    /// This candidate is the match; stop scanning
    Decisive,
    /// Plausible match; add to the accumulated set
    Candidate,
    /// Drop this candidate entirely, including earlier candidacy from other rules
    Exclude,
    NoOpinion,
}

/// Source-side signal shared by every rule for one resolution.
#[derive(Debug, Clone)]
pub struct SourceSignal {
    /// Shortened, lowercased domain token ("acme" for "mail.acme.co.uk")
    pub domain_token: String,
    /// Lowercased words of the license's company name
    pub company_words: Vec<String>,
}

impl SourceSignal {
    pub fn new(company_name: &str, domain_token: &str) -> Self {
        Self {
            domain_token: domain_token.to_lowercase(),
            company_words: split_words(company_name),
        }
    }
}

/// Candidate-side view: the provider name, and the comparable form of it.
#[derive(Debug, Clone)]
pub struct CandidateView<'a> {
    /// Provider name, trimmed
    pub name: &'a str,
    /// `name` shortened like a domain when it contains a `.`, else `name`
    pub shortened: &'a str,
}

impl CandidateView<'_> {
    fn shortened_lower(&self) -> String {
        self.shortened.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Shortened name equals the domain token
    ExactName,
    /// Initials of the shortened name equal the domain token
    Initials,
    /// "Venture" entities are noise unless the domain itself says venture
    VentureExclusion,
    /// Shortened name (with or without spaces) starts with the domain token
    Prefix,
    /// Word overlap between company name and candidate name
    WordOverlap,
}

/// Evaluation order. Decisive rules come first so the first exact or
/// initials hit wins before anything accumulates.
pub const DEFAULT_RULES: [MatchRule; 5] = [
    MatchRule::ExactName,
    MatchRule::Initials,
    MatchRule::VentureExclusion,
    MatchRule::Prefix,
    MatchRule::WordOverlap,
];

impl MatchRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::ExactName => "exact_name",
            MatchRule::Initials => "initials",
            MatchRule::VentureExclusion => "venture_exclusion",
            MatchRule::Prefix => "prefix",
            MatchRule::WordOverlap => "word_overlap",
        }
    }

    pub fn evaluate(&self, source: &SourceSignal, candidate: &CandidateView<'_>) -> RuleVerdict {
        let token = source.domain_token.as_str();
        match self {
            MatchRule::ExactName => {
                if !token.is_empty() && candidate.shortened_lower() == token {
                    RuleVerdict::Decisive
                } else {
                    RuleVerdict::NoOpinion
                }
            }
            MatchRule::Initials => {
                if !token.is_empty() && initials(candidate.shortened).to_lowercase() == token {
                    RuleVerdict::Decisive
                } else {
                    RuleVerdict::NoOpinion
                }
            }
            MatchRule::VentureExclusion => {
                if candidate.name.contains("Venture") && !token.contains("venture") {
                    RuleVerdict::Exclude
                } else {
                    RuleVerdict::NoOpinion
                }
            }
            MatchRule::Prefix => {
                if token.is_empty() {
                    return RuleVerdict::NoOpinion;
                }
                let lower = candidate.shortened_lower();
                let no_spaces = lower.replace(' ', "");
                if lower.starts_with(token) || no_spaces.starts_with(token) {
                    RuleVerdict::Candidate
                } else {
                    RuleVerdict::NoOpinion
                }
            }
            MatchRule::WordOverlap => {
                let candidate_words = split_words(candidate.shortened);
                if word_overlap_accepts(&source.company_words, &candidate_words) {
                    RuleVerdict::Candidate
                } else {
                    RuleVerdict::NoOpinion
                }
            }
        }
    }
}

fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_lowercase).collect()
}

/// Accepts when every candidate word appears in the company name, or when the
/// two agree on a leading run of words and the candidate's unmatched words
/// account for the rest of its list ("Acme Corp" vs "Acme Industries").
pub fn word_overlap_accepts(company_words: &[String], candidate_words: &[String]) -> bool {
    if company_words.is_empty() || candidate_words.is_empty() {
        return false;
    }

    let source: HashSet<&str> = company_words.iter().map(String::as_str).collect();
    let matches = candidate_words
        .iter()
        .filter(|w| source.contains(w.as_str()))
        .count();
    let mismatches = candidate_words.len() - matches;

    if matches > 0 && mismatches == 0 {
        return true;
    }

    let leading_run = company_words
        .iter()
        .zip(candidate_words.iter())
        .take_while(|(a, b)| a == b)
        .count();

    leading_run > 0 && leading_run + mismatches == candidate_words.len()
}
