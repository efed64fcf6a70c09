// src/matching/resolver.rs

use log::{debug, trace};

use crate::config::MIN_COMPANY_NAME_LEN;
use crate::matching::domain::DomainNormalizer;
use crate::matching::rules::{CandidateView, MatchRule, RuleVerdict, SourceSignal, DEFAULT_RULES};
use crate::models::{CandidateOrganization, ResolvedMatch};

/// Picks at most one provider candidate for a license's company.
///
/// Precision over recall: a wrong organization corrupts the table, so zero or
/// several plausible candidates both resolve to `None`.
#[derive(Debug, Clone)]
pub struct MatchResolver {
    normalizer: DomainNormalizer,
    rules: Vec<MatchRule>,
}

impl MatchResolver {
    pub fn new(normalizer: DomainNormalizer) -> Self {
        Self::with_rules(normalizer, DEFAULT_RULES.to_vec())
    }

    pub fn with_rules(normalizer: DomainNormalizer, rules: Vec<MatchRule>) -> Self {
        Self { normalizer, rules }
    }

    pub fn normalizer(&self) -> &DomainNormalizer {
        &self.normalizer
    }

    /// Resolves `candidates` against the company name and the email domain.
    ///
    /// `source_domain` may be a full domain or an already shortened token;
    /// shortening is idempotent.
    pub fn resolve(
        &self,
        company_name: &str,
        source_domain: &str,
        candidates: &[CandidateOrganization],
    ) -> Option<ResolvedMatch> {
        if company_name.trim().chars().count() < MIN_COMPANY_NAME_LEN {
            debug!(
                "Company name '{}' too short to resolve against {} candidates",
                company_name,
                candidates.len()
            );
            return None;
        }

        let domain_token = self.normalizer.shorten(source_domain);
        let source = SourceSignal::new(company_name, domain_token);

        // (candidate index, provider name), deduplicated by name
        let mut accumulated: Vec<(usize, &str)> = Vec::new();

        for (ix, candidate) in candidates.iter().enumerate() {
            let name = candidate.display_name();
            let shortened = if name.contains('.') {
                self.normalizer.shorten(name)
            } else {
                name
            };
            let view = CandidateView { name, shortened };
            trace!("looking at domain {}, response {}", domain_token, shortened);

            let mut is_candidate = false;
            for rule in &self.rules {
                match rule.evaluate(&source, &view) {
                    RuleVerdict::Decisive => {
                        debug!("Rule {} picks '{}' outright", rule.as_str(), name);
                        return Some(ResolvedMatch {
                            candidate_index: ix,
                            candidate_name: name.to_string(),
                        });
                    }
                    RuleVerdict::Exclude => {
                        trace!("Rule {} excludes '{}'", rule.as_str(), name);
                        is_candidate = false;
                        break;
                    }
                    RuleVerdict::Candidate => {
                        trace!("Rule {} accepts '{}' as a candidate", rule.as_str(), name);
                        is_candidate = true;
                    }
                    RuleVerdict::NoOpinion => {}
                }
            }

            if is_candidate && !accumulated.iter().any(|(_, n)| *n == name) {
                accumulated.push((ix, name));
            }
        }

        match accumulated.as_slice() {
            [(ix, name)] => Some(ResolvedMatch {
                candidate_index: *ix,
                candidate_name: name.to_string(),
            }),
            others => {
                debug!(
                    "{} accumulated candidates for '{}' ({}); no unique match",
                    others.len(),
                    company_name,
                    domain_token
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> MatchResolver {
        MatchResolver::new(DomainNormalizer::from_tokens(["com", "co", "uk", "inc", "io", "net"]))
    }

    fn candidates(names: &[&str]) -> Vec<CandidateOrganization> {
        names
            .iter()
            .map(|n| CandidateOrganization::named(n, "example.com"))
            .collect()
    }

    #[test]
    fn test_short_company_name_never_resolves() {
        let r = resolver();
        assert_eq!(r.resolve("A", "acme.com", &candidates(&["Acme"])), None);
        assert_eq!(r.resolve(" ", "acme.com", &candidates(&["Acme"])), None);
    }

    #[test]
    fn test_exact_match_wins_over_other_candidates() {
        let r = resolver();
        let items = candidates(&["Acme Industries", "Acme.com", "Acme Holdings"]);
        let picked = r.resolve("Acme Corp", "acme.com", &items).unwrap();
        assert_eq!(picked.candidate_index, 1);
        assert_eq!(picked.candidate_name, "Acme.com");
    }

    #[test]
    fn test_single_prefix_candidate_resolves() {
        let r = resolver();
        let picked = r.resolve("Acme Corp", "acme", &candidates(&["Acme Corp"])).unwrap();
        assert_eq!(picked.candidate_index, 0);
    }

    #[test]
    fn test_two_prefix_candidates_are_ambiguous() {
        let r = resolver();
        let items = candidates(&["Acme Corp", "Acme Industries"]);
        assert_eq!(r.resolve("Acme Corp", "acme.com", &items), None);
    }

    #[test]
    fn test_initials_match() {
        let r = resolver();
        let items = candidates(&["Ibex Labs", "International Business Machines"]);
        let picked = r.resolve("IBM Corp", "ibm.com", &items).unwrap();
        assert_eq!(picked.candidate_index, 1);
    }

    #[test]
    fn test_venture_candidate_never_selected() {
        let r = resolver();
        assert_eq!(r.resolve("Acme", "acme.com", &candidates(&["Acme Ventures"])), None);

        let items = candidates(&["Acme Ventures", "Acme Software"]);
        let picked = r.resolve("Acme", "acme.com", &items).unwrap();
        assert_eq!(picked.candidate_name, "Acme Software");
    }

    #[test]
    fn test_duplicate_names_count_once() {
        let r = resolver();
        let items = candidates(&["Acme Labs", "Acme Labs"]);
        let picked = r.resolve("Acme Labs", "acme.io", &items).unwrap();
        assert_eq!(picked.candidate_index, 0);
    }

    #[test]
    fn test_word_overlap_without_domain_signal() {
        let r = resolver();
        // domain says nothing about the name; words carry the match
        let items = candidates(&["Northwind Traders", "Contoso"]);
        let picked = r.resolve("Northwind Traders", "nwt-mail.net", &items).unwrap();
        assert_eq!(picked.candidate_name, "Northwind Traders");
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(resolver().resolve("Acme Corp", "acme.com", &[]), None);
    }

    #[test]
    fn test_domain_like_candidate_names_are_shortened() {
        let r = resolver();
        let picked = r.resolve("Widgets", "widgets.io", &candidates(&["widgets.co.uk"])).unwrap();
        assert_eq!(picked.candidate_name, "widgets.co.uk");
    }
}
