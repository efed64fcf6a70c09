// src/feed.rs

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::models::SourceRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseEntry {
    #[serde(default)]
    contact_details: Option<ContactDetails>,
}

impl LicenseEntry {
    fn into_record(self) -> Option<SourceRecord> {
        let details = self.contact_details?;
        let email = details.technical_contact.and_then(|c| c.email)?;
        let company = details.company?;
        Some(SourceRecord::new(email, company))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactDetails {
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    technical_contact: Option<TechnicalContact>,
}

#[derive(Debug, Deserialize)]
struct TechnicalContact {
    #[serde(default)]
    email: Option<String>,
}

/// Reads the license export (a JSON array) and yields one record per license
/// that carries both `contactDetails.technicalContact.email` and
/// `contactDetails.company`. Entries missing either are logged and dropped.
pub fn read_source_records<R: Read>(reader: R) -> Result<Vec<SourceRecord>> {
    let entries: Vec<LicenseEntry> =
        serde_json::from_reader(reader).context("Failed to parse license feed as a JSON array")?;

    let total = entries.len();
    let records: Vec<SourceRecord> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(ix, entry)| {
            let record = entry.into_record();
            if record.is_none() {
                warn!(
                    "License #{} lacks a technical contact email or company; ignoring it",
                    ix
                );
            }
            record
        })
        .collect();

    debug!("Read {} usable records from {} licenses", records.len(), total);
    Ok(records)
}

/// Reads the feed from `path`, or from standard input when no path is given.
pub fn load_source_records(path: Option<&Path>) -> Result<Vec<SourceRecord>> {
    match path {
        Some(p) => {
            let file = File::open(p)
                .with_context(|| format!("Failed to open license feed {}", p.display()))?;
            read_source_records(BufReader::new(file))
        }
        None => read_source_records(std::io::stdin().lock()),
    }
}
