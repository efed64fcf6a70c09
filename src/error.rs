// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run.
///
/// Everything else (bad emails, provider non-200s, a failed write for one
/// record) is logged and counted by the pipeline instead of being raised.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("missing required configuration: please set {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration value for {var}: {reason}")]
    InvalidConfig { var: &'static str, reason: String },

    #[error("unable to reach the company-data provider after {attempts} attempts: {last_error}")]
    ConnectFailed { attempts: u32, last_error: String },

    #[error("bad reference data in {path}:{line}: {reason}")]
    ReferenceData {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
