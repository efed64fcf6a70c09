// src/sync.rs
//
// Dedup-aware upsert: decides insert vs update vs no-op for a resolved
// candidate, links new organizations to their license, and removes inserts
// that can't be linked to exactly one license.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

use crate::models::{CandidateOrganization, OrganizationId, OrganizationRecord, SyncOutcome};
use crate::store::OrganizationStore;

/// Keys seen during one run. Built empty at run start, never persisted.
///
/// `already_stored` keeps the row this run last wrote or read for a domain,
/// so a later candidate for the same domain is compared against it without
/// another existence check.
#[derive(Debug, Default, Clone)]
pub struct ResolutionKeySets {
    domains_queried: HashSet<String>,
    already_stored: HashMap<String, (OrganizationId, OrganizationRecord)>,
}

impl ResolutionKeySets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `domain` as queried. Returns false if it was already queried
    /// this run.
    pub fn mark_queried(&mut self, domain: &str) -> bool {
        self.domains_queried.insert(domain.to_string())
    }

    pub fn was_queried(&self, domain: &str) -> bool {
        self.domains_queried.contains(domain)
    }

    pub fn is_stored(&self, domain: &str) -> bool {
        self.already_stored.contains_key(domain)
    }

    fn stored(&self, domain: &str) -> Option<&(OrganizationId, OrganizationRecord)> {
        self.already_stored.get(domain)
    }

    fn mark_stored(&mut self, id: OrganizationId, record: OrganizationRecord) {
        self.already_stored.insert(record.domain.clone(), (id, record));
    }

    fn forget_stored(&mut self, domain: &str) {
        self.already_stored.remove(domain);
    }

    pub fn stored_count(&self) -> usize {
        self.already_stored.len()
    }
}

/// Upsert layer over an [`OrganizationStore`].
pub struct OrganizationSync<S> {
    store: S,
}

impl<S: OrganizationStore> OrganizationSync<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Stores or refreshes `candidate`, resolved for the license company
    /// `company`. Exactly one of insert or update is chosen per domain; an
    /// unchanged row is left alone.
    pub async fn sync(
        &self,
        keys: &mut ResolutionKeySets,
        candidate: &CandidateOrganization,
        company: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let Some(record) = OrganizationRecord::from_candidate(candidate, synced_at) else {
            info!(
                "{} *not* stored or updated: provider record lacks a name or domain",
                company
            );
            return Ok(SyncOutcome::Incomplete);
        };

        // Existence is checked once per domain per run; the answer picks the
        // INSERT or UPDATE branch.
        let known = match keys.stored(&record.domain) {
            Some((id, stored)) => Some((*id, stored.clone())),
            None => self.store.find_by_domain(&record.domain).await?,
        };

        match known {
            Some((id, stored)) => {
                let outcome = self.refresh(id, &record, &stored).await;
                match &outcome {
                    Ok(SyncOutcome::Updated) => keys.mark_stored(id, record),
                    Ok(_) => keys.mark_stored(id, stored),
                    Err(_) => keys.forget_stored(&record.domain),
                }
                outcome
            }
            None => self.insert_and_link(keys, &record, company).await,
        }
    }

    async fn refresh(
        &self,
        id: OrganizationId,
        record: &OrganizationRecord,
        stored: &OrganizationRecord,
    ) -> Result<SyncOutcome> {
        if !record.differs_from(stored) {
            debug!("new item same as old; not updating {}", record.domain);
            return Ok(SyncOutcome::Unchanged);
        }

        info!("Updating company {} in organizations", record.name);
        let rows = self.store.update(record).await?;
        if rows == 0 {
            return Err(anyhow!(
                "Update of organization {} (id {}) affected no rows",
                record.domain,
                id.0
            ));
        }
        info!("{} updated in organizations", record.name);
        Ok(SyncOutcome::Updated)
    }

    async fn insert_and_link(
        &self,
        keys: &mut ResolutionKeySets,
        record: &OrganizationRecord,
        company: &str,
    ) -> Result<SyncOutcome> {
        info!("Inserting company {} into organizations", record.name);
        let id = self.store.insert(record).await?;

        let linked = match self.link(id, company).await {
            Ok(linked) => linked,
            Err(e) => {
                // Compensate before surfacing the error so no orphan survives.
                self.remove_orphan(id, record).await?;
                return Err(e);
            }
        };

        if linked {
            keys.mark_stored(id, record.clone());
            info!("{} stored in organizations", company);
            return Ok(SyncOutcome::Stored(id));
        }

        self.remove_orphan(id, record).await?;
        Ok(SyncOutcome::OrphanRemoved)
    }

    /// Links `id` to the license for `company` if exactly one license
    /// contact row carries that company name.
    async fn link(&self, id: OrganizationId, company: &str) -> Result<bool> {
        let contacts = self.store.license_contact_ids(company).await?;
        match contacts.as_slice() {
            [contact] => {
                let rows = self.store.link_license(id, *contact).await?;
                if rows == 0 {
                    warn!("Failed to store fk for {} into licenses", company);
                }
                Ok(rows > 0)
            }
            others => {
                warn!(
                    "CANNOT LINK ORG {}: {} license contact details ids returned",
                    company,
                    others.len()
                );
                Ok(false)
            }
        }
    }

    async fn remove_orphan(&self, id: OrganizationId, record: &OrganizationRecord) -> Result<()> {
        let rows = self.store.delete_unlinked(id).await?;
        if rows == 0 {
            return Err(anyhow!(
                "FAILED TO DELETE orphan organization {} (id {})",
                record.domain,
                id.0
            ));
        }
        info!("DELETED {} from organizations", record.name);
        Ok(())
    }
}
