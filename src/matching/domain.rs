// src/matching/domain.rs

use std::collections::HashSet;

/// Extracts the domain part of an email address.
///
/// The address must contain exactly one `@`, not in first position, and a `.`
/// somewhere after the character following the `@`. Anything else yields `None`.
pub fn extract_domain(email: &str) -> Option<&str> {
    let email = email.trim();
    if email.matches('@').count() != 1 {
        return None;
    }
    let at_ix = email.rfind('@')?;
    let dot_ix = email.rfind('.')?;
    if at_ix == 0 || dot_ix <= at_ix + 1 {
        return None;
    }
    Some(&email[at_ix + 1..])
}

/// First character of `name`, plus every character that immediately follows
/// a space. "International Business Machines" gives "IBM".
pub fn initials(name: &str) -> String {
    let mut out = String::new();
    let mut prev: Option<char> = None;
    for c in name.chars() {
        match prev {
            None => out.push(c),
            Some(' ') => out.push(c),
            _ => {}
        }
        prev = Some(c);
    }
    out
}

/// Strips known TLD and country-code suffixes to obtain a comparable token.
#[derive(Debug, Clone, Default)]
pub struct DomainNormalizer {
    tlds: HashSet<String>,
}

impl DomainNormalizer {
    pub fn new(tlds: HashSet<String>) -> Self {
        Self { tlds }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            tokens
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        )
    }

    pub fn is_tld(&self, segment: &str) -> bool {
        self.tlds.contains(&segment.to_lowercase())
    }

    /// Drops trailing dots, then trailing segments that are known suffixes,
    /// and returns the rightmost remaining segment. A lone segment is never
    /// dropped, so `shorten("com")` is `"com"`. Case is preserved.
    ///
    /// `shorten("Example.Co.Inc.")` with suffixes `{inc, co}` gives `"Example"`.
    pub fn shorten<'a>(&self, domain: &'a str) -> &'a str {
        let trimmed = domain.trim_end_matches('.');
        let mut segments: Vec<&str> = trimmed.split('.').collect();
        while segments.len() > 1 && segments.last().is_some_and(|s| self.is_tld(s)) {
            segments.pop();
        }
        segments.last().copied().unwrap_or("")
    }
}
