// src/store/memory.rs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use crate::models::{LicenseContactId, OrganizationId, OrganizationRecord};
use crate::store::OrganizationStore;

/// A write that reached the store, in order. Lets callers check that a no-op
/// sync really wrote nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Insert(String),
    Update(String),
    Link(OrganizationId, LicenseContactId),
    Delete(OrganizationId),
}

#[derive(Debug, Default)]
struct Inner {
    next_org_id: i64,
    next_contact_id: i64,
    organizations: BTreeMap<i64, OrganizationRecord>,
    /// license_contact_details: id -> company
    contacts: BTreeMap<i64, String>,
    /// licenses: license_contact_details_id -> organization_id
    licenses: HashMap<i64, Option<OrganizationId>>,
    writes: Vec<StoreWrite>,
    lookups: usize,
    failing_domains: HashSet<String>,
    failing_lookups: HashSet<String>,
}

/// `OrganizationStore` held in memory, with the same uniqueness and linkage
/// rules as the PostgreSQL tables. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryOrganizationStore {
    inner: Mutex<Inner>,
}

impl InMemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a license with its contact details row; returns the contact id.
    pub async fn add_license(&self, company: &str) -> LicenseContactId {
        let mut inner = self.inner.lock().await;
        inner.next_contact_id += 1;
        let id = inner.next_contact_id;
        inner.contacts.insert(id, company.to_string());
        inner.licenses.insert(id, None);
        LicenseContactId(id)
    }

    /// Makes every insert or update for `domain` fail.
    pub async fn fail_writes_for(&self, domain: &str) {
        self.inner
            .lock()
            .await
            .failing_domains
            .insert(domain.to_string());
    }

    /// Makes every `find_by_domain` for `domain` fail, as a row that can't
    /// be decoded would.
    pub async fn fail_lookups_for(&self, domain: &str) {
        self.inner
            .lock()
            .await
            .failing_lookups
            .insert(domain.to_string());
    }

    /// Number of `find_by_domain` calls so far.
    pub async fn lookups(&self) -> usize {
        self.inner.lock().await.lookups
    }

    pub async fn organization_count(&self) -> usize {
        self.inner.lock().await.organizations.len()
    }

    pub async fn linked_organization(&self, contact: LicenseContactId) -> Option<OrganizationId> {
        self.inner
            .lock()
            .await
            .licenses
            .get(&contact.0)
            .copied()
            .flatten()
    }

    pub async fn writes(&self) -> Vec<StoreWrite> {
        self.inner.lock().await.writes.clone()
    }
}

#[async_trait]
impl OrganizationStore for InMemoryOrganizationStore {
    async fn find_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<(OrganizationId, OrganizationRecord)>> {
        let mut inner = self.inner.lock().await;
        inner.lookups += 1;
        if inner.failing_lookups.contains(domain) {
            return Err(anyhow!("simulated read failure for {}", domain));
        }
        Ok(inner
            .organizations
            .iter()
            .find(|(_, r)| r.domain == domain)
            .map(|(id, r)| (OrganizationId(*id), r.clone())))
    }

    async fn insert(&self, record: &OrganizationRecord) -> Result<OrganizationId> {
        let mut inner = self.inner.lock().await;
        if inner.failing_domains.contains(&record.domain) {
            return Err(anyhow!("simulated insert failure for {}", record.domain));
        }
        if inner.organizations.values().any(|r| r.domain == record.domain) {
            return Err(anyhow!(
                "duplicate key value violates unique constraint on domain {}",
                record.domain
            ));
        }
        inner.next_org_id += 1;
        let id = inner.next_org_id;
        inner.organizations.insert(id, record.clone());
        inner.writes.push(StoreWrite::Insert(record.domain.clone()));
        Ok(OrganizationId(id))
    }

    async fn update(&self, record: &OrganizationRecord) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        if inner.failing_domains.contains(&record.domain) {
            return Err(anyhow!("simulated update failure for {}", record.domain));
        }
        let Some(existing) = inner
            .organizations
            .values_mut()
            .find(|r| r.domain == record.domain)
        else {
            return Ok(0);
        };
        *existing = record.clone();
        inner.writes.push(StoreWrite::Update(record.domain.clone()));
        Ok(1)
    }

    async fn license_contact_ids(&self, company: &str) -> Result<Vec<LicenseContactId>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .contacts
            .iter()
            .filter(|(_, c)| c.as_str() == company)
            .map(|(id, _)| LicenseContactId(*id))
            .collect())
    }

    async fn link_license(
        &self,
        organization: OrganizationId,
        contact: LicenseContactId,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        match inner.licenses.get_mut(&contact.0) {
            Some(slot) => {
                *slot = Some(organization);
                inner.writes.push(StoreWrite::Link(organization, contact));
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_unlinked(&self, organization: OrganizationId) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let referenced = inner
            .licenses
            .values()
            .any(|linked| *linked == Some(organization));
        if referenced || inner.organizations.remove(&organization.0).is_none() {
            return Ok(0);
        }
        inner.writes.push(StoreWrite::Delete(organization));
        Ok(1)
    }
}
