// src/lib.rs
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod results;
pub mod store;
pub mod sync;

// Re-export common types for easier access
pub use models::{
    CandidateOrganization, OrganizationId, OrganizationRecord, ResolvedMatch, SourceRecord,
    SyncOutcome,
};

// Re-export important functionality
pub use client::{CompanyDirectory, QueryClient};
pub use db::PgPool;
pub use error::SyncError;
pub use pipeline::Pipeline;
pub use results::RunStatistics;
pub use store::OrganizationStore;
