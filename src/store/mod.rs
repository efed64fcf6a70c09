// src/store/mod.rs

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{LicenseContactId, OrganizationId, OrganizationRecord};

pub use memory::InMemoryOrganizationStore;
pub use postgres::PgOrganizationStore;

/// Relational storage used by the upsert layer.
///
/// Each call is its own unit of work; nothing spans records.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// The stored row for `domain`, if any.
    async fn find_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<(OrganizationId, OrganizationRecord)>>;

    async fn insert(&self, record: &OrganizationRecord) -> Result<OrganizationId>;

    /// Rewrites the row keyed by `record.domain`. Returns rows affected.
    async fn update(&self, record: &OrganizationRecord) -> Result<u64>;

    /// License contact detail rows whose company equals `company`.
    async fn license_contact_ids(&self, company: &str) -> Result<Vec<LicenseContactId>>;

    /// Points the license owning `contact` at `organization`. Returns rows affected.
    async fn link_license(
        &self,
        organization: OrganizationId,
        contact: LicenseContactId,
    ) -> Result<u64>;

    /// Deletes `organization` unless a license references it. Returns rows affected.
    async fn delete_unlinked(&self, organization: OrganizationId) -> Result<u64>;

    async fn exists(&self, domain: &str) -> Result<bool> {
        Ok(self.find_by_domain(domain).await?.is_some())
    }
}
