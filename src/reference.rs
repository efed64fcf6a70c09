// src/reference.rs
//
// Static reference lists: consumer ISP domains and TLD/country-code suffixes.
// Format is one lowercase token per line; blank lines and `#` comments are
// ignored. Anything outside the allowed character set is rejected outright.

use log::info;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// e.g. `gmail.com`, `btinternet.co.uk`
    IspDomain,
    /// e.g. `com`, `uk`, `inc`
    Tld,
}

impl ListKind {
    fn allows(&self, c: char) -> bool {
        match self {
            ListKind::IspDomain => c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-',
            ListKind::Tld => c.is_ascii_lowercase(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ListKind::IspDomain => "ISP domain",
            ListKind::Tld => "TLD",
        }
    }
}

/// Parses a reference list. `path` is only used for error messages.
pub fn parse_list(text: &str, kind: ListKind, path: &Path) -> Result<HashSet<String>, SyncError> {
    let mut tokens = HashSet::new();
    for (ix, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(bad) = line.chars().find(|c| !kind.allows(*c)) {
            return Err(SyncError::ReferenceData {
                path: path.to_path_buf(),
                line: ix + 1,
                reason: format!("unexpected character {:?} in {} '{}'", bad, kind.label(), line),
            });
        }
        tokens.insert(line.to_string());
    }
    Ok(tokens)
}

pub fn load_list(path: &Path, kind: ListKind) -> Result<HashSet<String>, SyncError> {
    let text = fs::read_to_string(path).map_err(|e| SyncError::ReferenceData {
        path: path.to_path_buf(),
        line: 0,
        reason: e.to_string(),
    })?;
    let tokens = parse_list(&text, kind, path)?;
    info!(
        "Loaded {} {} entries from {}",
        tokens.len(),
        kind.label(),
        path.display()
    );
    Ok(tokens)
}

pub fn load_isp_domains(path: &Path) -> Result<HashSet<String>, SyncError> {
    load_list(path, ListKind::IspDomain)
}

pub fn load_tlds(path: &Path) -> Result<HashSet<String>, SyncError> {
    load_list(path, ListKind::Tld)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "# common suffixes\ncom\n\n  org  \nuk\n";
        let set = parse_list(text, ListKind::Tld, Path::new("tlds.txt")).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("org"));
    }

    #[test]
    fn test_parse_rejects_expression_like_input() {
        let text = "com\n__import__('os')\n";
        let err = parse_list(text, ListKind::Tld, Path::new("tlds.txt")).unwrap_err();
        match err {
            SyncError::ReferenceData { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_isp_list_allows_dots_and_digits() {
        let set = parse_list("gmail.com\nt-online.de\n163.com\n", ListKind::IspDomain, Path::new("isp"))
            .unwrap();
        assert!(set.contains("t-online.de"));
        assert!(set.contains("163.com"));
        assert!(parse_list("Gmail.com\n", ListKind::IspDomain, Path::new("isp")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "inc\nco").unwrap();
        let set = load_tlds(file.path()).unwrap();
        assert!(set.contains("inc") && set.contains("co"));
    }

    #[test]
    fn test_missing_file_is_reference_error() {
        let err = load_isp_domains(Path::new("/nonexistent/isp_domains.txt")).unwrap_err();
        assert!(matches!(err, SyncError::ReferenceData { line: 0, .. }));
    }
}
