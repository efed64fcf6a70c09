// src/results.rs

use std::fmt;
use std::time::Duration;

use crate::models::{HitCount, SyncOutcome};

/// What happened to one source record. Returned by the driver's per-record
/// step and folded into [`RunStatistics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDelta {
    /// Examined but not processed (start offset or malformed email)
    pub skipped: bool,
    pub bad_email: bool,
    pub isp: bool,
    pub repeat_domain: bool,
    pub domain_hits: Option<HitCount>,
    pub name_hits: Option<HitCount>,
    /// A query returned candidates but none could be picked
    pub unresolved: bool,
    pub sync: Option<SyncOutcome>,
    pub query_errors: usize,
    pub store_error: bool,
    /// Time spent waiting on the provider for this record
    pub query_time: Duration,
}

impl RecordDelta {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn bad_email() -> Self {
        Self {
            skipped: true,
            bad_email: true,
            ..Default::default()
        }
    }
}

/// Tallies for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub examined: usize,
    pub skipped: usize,
    pub not_skipped: usize,
    pub bad_emails: usize,
    pub isps: usize,
    pub repeat_domains: usize,

    pub domain_misses: usize,
    pub domain_single: usize,
    pub domain_multiple: usize,

    pub name_queries: usize,
    pub name_misses: usize,
    pub name_single: usize,
    pub name_multiple: usize,

    pub unresolved: usize,
    pub stored: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub orphans_removed: usize,
    pub incomplete: usize,

    pub query_errors: usize,
    pub store_errors: usize,
    pub query_time: Duration,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, delta: &RecordDelta) {
        self.examined += 1;
        self.query_time += delta.query_time;
        self.query_errors += delta.query_errors;

        if delta.skipped {
            self.skipped += 1;
            if delta.bad_email {
                self.bad_emails += 1;
            }
            return;
        }
        self.not_skipped += 1;

        if delta.isp {
            self.isps += 1;
        }
        if delta.repeat_domain {
            self.repeat_domains += 1;
        }
        match delta.domain_hits {
            Some(HitCount::Miss) => self.domain_misses += 1,
            Some(HitCount::Single) => self.domain_single += 1,
            Some(HitCount::Multiple) => self.domain_multiple += 1,
            None => {}
        }
        if let Some(hits) = delta.name_hits {
            self.name_queries += 1;
            match hits {
                HitCount::Miss => self.name_misses += 1,
                HitCount::Single => self.name_single += 1,
                HitCount::Multiple => self.name_multiple += 1,
            }
        }
        if delta.unresolved {
            self.unresolved += 1;
        }
        match delta.sync {
            Some(SyncOutcome::Stored(_)) => self.stored += 1,
            Some(SyncOutcome::Updated) => self.updated += 1,
            Some(SyncOutcome::Unchanged) => self.unchanged += 1,
            Some(SyncOutcome::OrphanRemoved) => self.orphans_removed += 1,
            Some(SyncOutcome::Incomplete) => self.incomplete += 1,
            None => {}
        }
        if delta.store_error {
            self.store_errors += 1;
        }
    }

    /// `examined - skipped == isps + domain misses + single + multiple + repeats`
    pub fn is_consistent(&self) -> bool {
        self.examined.checked_sub(self.skipped)
            == Some(
                self.isps
                    + self.domain_misses
                    + self.domain_single
                    + self.domain_multiple
                    + self.repeat_domains,
            )
    }

    pub fn stored_or_updated(&self) -> usize {
        self.stored + self.updated
    }

    /// Provider responses received: every domain query plus every name query.
    pub fn responses(&self) -> usize {
        self.domain_misses + self.domain_single + self.domain_multiple + self.name_queries
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} domains examined:", self.examined.saturating_sub(self.skipped))?;
        writeln!(f, "\t{} domains are ISPs", self.isps)?;
        writeln!(f, "\t{} domains not found", self.domain_misses)?;
        writeln!(f, "\t{} single domain hits found", self.domain_single)?;
        writeln!(f, "\t{} multiple domain hits found", self.domain_multiple)?;
        writeln!(f, "\t{} repeat domains found", self.repeat_domains)?;
        writeln!(f, "{} names examined:", self.name_queries)?;
        writeln!(f, "\t{} names not found", self.name_misses)?;
        writeln!(f, "\t{} single name hits found", self.name_single)?;
        writeln!(f, "\t{} multiple name hits found", self.name_multiple)?;
        writeln!(
            f,
            "{:.2} secs spent in getting {} responses from provider",
            self.query_time.as_secs_f64(),
            self.responses()
        )?;
        writeln!(
            f,
            "{} orgs stored or updated in organizations",
            self.stored_or_updated()
        )?;
        writeln!(f, "\t{} stored, {} updated", self.stored, self.updated)?;
        writeln!(f, "{} candidates unresolved", self.unresolved)?;
        writeln!(f, "{} orgs unchanged", self.unchanged)?;
        writeln!(f, "{} orphan orgs removed", self.orphans_removed)?;
        writeln!(f, "{} candidates incomplete", self.incomplete)?;
        writeln!(
            f,
            "{} records skipped ({} bad emails)",
            self.skipped, self.bad_emails
        )?;
        writeln!(
            f,
            "{} query errors, {} store errors",
            self.query_errors, self.store_errors
        )?;
        write!(
            f,
            "consistency check: {}",
            if self.is_consistent() { "ok" } else { "FAILED" }
        )
    }
}
