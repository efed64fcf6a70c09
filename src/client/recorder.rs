// src/client/recorder.rs

use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::QueryKind;

/// Where the raw responses of one query kind should go at end of run.
#[derive(Debug, Clone, Default)]
pub struct AuditTarget {
    pub file: Option<PathBuf>,
    pub to_stdout: bool,
}

impl AuditTarget {
    pub fn is_enabled(&self) -> bool {
        self.file.is_some() || self.to_stdout
    }
}

/// Buffers raw provider responses and writes each kind out as one JSON array.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    domain_target: AuditTarget,
    name_target: AuditTarget,
    domain_responses: Vec<Value>,
    name_responses: Vec<Value>,
}

impl ResponseRecorder {
    pub fn new(domain_target: AuditTarget, name_target: AuditTarget) -> Self {
        Self {
            domain_target,
            name_target,
            ..Default::default()
        }
    }

    /// Keeps `raw` if the given kind has an audit target; otherwise drops it.
    pub fn record(&mut self, kind: QueryKind, raw: &Value) {
        match kind {
            QueryKind::Domain if self.domain_target.is_enabled() => {
                self.domain_responses.push(raw.clone())
            }
            QueryKind::Name if self.name_target.is_enabled() => {
                self.name_responses.push(raw.clone())
            }
            _ => {}
        }
    }

    pub fn buffered(&self, kind: QueryKind) -> &[Value] {
        match kind {
            QueryKind::Domain => &self.domain_responses,
            QueryKind::Name => &self.name_responses,
        }
    }

    /// Writes every buffered response to its targets and clears the buffers.
    pub fn flush(&mut self) -> Result<()> {
        write_target(&self.domain_target, &self.domain_responses, QueryKind::Domain)?;
        write_target(&self.name_target, &self.name_responses, QueryKind::Name)?;
        self.domain_responses.clear();
        self.name_responses.clear();
        Ok(())
    }
}

fn write_target(target: &AuditTarget, responses: &[Value], kind: QueryKind) -> Result<()> {
    if !target.is_enabled() {
        return Ok(());
    }

    if let Some(path) = &target.file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create audit file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, responses)
            .with_context(|| format!("Failed to write audit file {}", path.display()))?;
        writer.flush()?;
        info!(
            "Wrote {} {} query responses to {}",
            responses.len(),
            kind.as_str(),
            path.display()
        );
    }

    if target.to_stdout {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, responses)
            .context("Failed to write query responses to stdout")?;
        writeln!(out)?;
        debug!("Wrote {} {} query responses to stdout", responses.len(), kind.as_str());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disabled_kind_is_not_buffered() {
        let mut recorder = ResponseRecorder::new(AuditTarget::default(), AuditTarget::default());
        recorder.record(QueryKind::Domain, &json!({"data": {"items": []}}));
        assert!(recorder.buffered(QueryKind::Domain).is_empty());
    }

    #[test]
    fn test_flush_writes_valid_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domain_search.json");
        let mut recorder = ResponseRecorder::new(
            AuditTarget {
                file: Some(path.clone()),
                to_stdout: false,
            },
            AuditTarget::default(),
        );

        recorder.record(QueryKind::Domain, &json!({"data": {"items": [1]}}));
        recorder.record(QueryKind::Domain, &json!({"data": {"items": [2]}}));
        recorder.record(QueryKind::Name, &json!({"ignored": true}));
        recorder.flush().unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 2);
        assert!(recorder.buffered(QueryKind::Domain).is_empty());
    }
}
