// src/store/postgres.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use tokio_postgres::Row as PgRow;

use crate::db::PgPool;
use crate::models::{LicenseContactId, OrganizationId, OrganizationRecord};
use crate::store::OrganizationStore;

const SELECT_BY_DOMAIN_SQL: &str = "
    SELECT id, name, domain, primary_role, short_description, homepage_url,
           facebook_url, twitter_url, linkedin_url, api_url, city, region, country,
           stock_exchange, stock_symbol, created_at, updated_at, last_synced_at
    FROM organizations
    WHERE domain = $1";

const INSERT_ORG_SQL: &str = "
    INSERT INTO organizations (
        name, domain, primary_role, short_description, homepage_url,
        facebook_url, twitter_url, linkedin_url, api_url, city, region, country,
        stock_exchange, stock_symbol, created_at, updated_at, last_synced_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
    RETURNING id";

const UPDATE_ORG_SQL: &str = "
    UPDATE organizations SET
        name = $1, primary_role = $3, short_description = $4, homepage_url = $5,
        facebook_url = $6, twitter_url = $7, linkedin_url = $8, api_url = $9,
        city = $10, region = $11, country = $12, stock_exchange = $13,
        stock_symbol = $14, created_at = $15, updated_at = $16, last_synced_at = $17
    WHERE domain = $2";

const SELECT_CONTACT_IDS_SQL: &str = "
    SELECT id FROM license_contact_details WHERE company = $1";

const LINK_LICENSE_SQL: &str = "
    UPDATE licenses SET organization_id = $1
    WHERE license_contact_details_id = $2";

const DELETE_UNLINKED_SQL: &str = "
    DELETE FROM organizations o
    WHERE o.id = $1
      AND NOT EXISTS (SELECT 1 FROM licenses l WHERE l.organization_id = o.id)";

/// `OrganizationStore` over the `organizations`, `license_contact_details`
/// and `licenses` tables.
pub struct PgOrganizationStore {
    pool: PgPool,
}

impl PgOrganizationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Decodes an `organizations` row. A NULL in a required column is an error,
/// not a panic, so one bad row only costs its own record.
fn row_to_record(row: &PgRow) -> Result<(OrganizationId, OrganizationRecord)> {
    let id: OrganizationId = row.try_get("id").context("organizations.id")?;
    let domain: String = row
        .try_get("domain")
        .with_context(|| format!("organizations.domain for id {}", id.0))?;
    let column = |name: &str| format!("organizations.{} for domain {}", name, domain);

    let record = OrganizationRecord {
        name: row.try_get("name").with_context(|| column("name"))?,
        primary_role: row.try_get("primary_role").with_context(|| column("primary_role"))?,
        short_description: row
            .try_get("short_description")
            .with_context(|| column("short_description"))?,
        homepage_url: row.try_get("homepage_url").with_context(|| column("homepage_url"))?,
        facebook_url: row.try_get("facebook_url").with_context(|| column("facebook_url"))?,
        twitter_url: row.try_get("twitter_url").with_context(|| column("twitter_url"))?,
        linkedin_url: row.try_get("linkedin_url").with_context(|| column("linkedin_url"))?,
        api_url: row.try_get("api_url").with_context(|| column("api_url"))?,
        city: row.try_get("city").with_context(|| column("city"))?,
        region: row.try_get("region").with_context(|| column("region"))?,
        country: row.try_get("country").with_context(|| column("country"))?,
        stock_exchange: row
            .try_get("stock_exchange")
            .with_context(|| column("stock_exchange"))?,
        stock_symbol: row.try_get("stock_symbol").with_context(|| column("stock_symbol"))?,
        created_at: row.try_get("created_at").with_context(|| column("created_at"))?,
        updated_at: row.try_get("updated_at").with_context(|| column("updated_at"))?,
        last_synced_at: row
            .try_get("last_synced_at")
            .with_context(|| column("last_synced_at"))?,
        domain,
    };
    Ok((id, record))
}

#[async_trait]
impl OrganizationStore for PgOrganizationStore {
    async fn find_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<(OrganizationId, OrganizationRecord)>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for find_by_domain")?;
        let row = conn
            .query_opt(SELECT_BY_DOMAIN_SQL, &[&domain])
            .await
            .with_context(|| format!("Failed to look up organization for domain {}", domain))?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert(&self, r: &OrganizationRecord) -> Result<OrganizationId> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for organization insert")?;
        let row = conn
            .query_one(
                INSERT_ORG_SQL,
                &[
                    &r.name,
                    &r.domain,
                    &r.primary_role,
                    &r.short_description,
                    &r.homepage_url,
                    &r.facebook_url,
                    &r.twitter_url,
                    &r.linkedin_url,
                    &r.api_url,
                    &r.city,
                    &r.region,
                    &r.country,
                    &r.stock_exchange,
                    &r.stock_symbol,
                    &r.created_at,
                    &r.updated_at,
                    &r.last_synced_at,
                ],
            )
            .await
            .with_context(|| format!("Failed to insert organization {} ({})", r.name, r.domain))?;
        let id: OrganizationId = row
            .try_get(0)
            .context("INSERT into organizations returned no id")?;
        debug!("Inserted organization {} as id {}", r.domain, id.0);
        Ok(id)
    }

    async fn update(&self, r: &OrganizationRecord) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for organization update")?;
        conn.execute(
            UPDATE_ORG_SQL,
            &[
                &r.name,
                &r.domain,
                &r.primary_role,
                &r.short_description,
                &r.homepage_url,
                &r.facebook_url,
                &r.twitter_url,
                &r.linkedin_url,
                &r.api_url,
                &r.city,
                &r.region,
                &r.country,
                &r.stock_exchange,
                &r.stock_symbol,
                &r.created_at,
                &r.updated_at,
                &r.last_synced_at,
            ],
        )
        .await
        .with_context(|| format!("Failed to update organization {}", r.domain))
    }

    async fn license_contact_ids(&self, company: &str) -> Result<Vec<LicenseContactId>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for license contact lookup")?;
        let rows = conn
            .query(SELECT_CONTACT_IDS_SQL, &[&company])
            .await
            .with_context(|| format!("Failed to look up license contacts for '{}'", company))?;
        rows.iter()
            .map(|row| {
                row.try_get::<_, i64>("id")
                    .map(LicenseContactId)
                    .context("license_contact_details.id")
            })
            .collect()
    }

    async fn link_license(
        &self,
        organization: OrganizationId,
        contact: LicenseContactId,
    ) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for license link")?;
        conn.execute(LINK_LICENSE_SQL, &[&organization, &contact.0])
            .await
            .with_context(|| {
                format!(
                    "Failed to link organization {} to license contact {}",
                    organization.0, contact.0
                )
            })
    }

    async fn delete_unlinked(&self, organization: OrganizationId) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for orphan delete")?;
        conn.execute(DELETE_UNLINKED_SQL, &[&organization])
            .await
            .with_context(|| format!("Failed to delete orphan organization {}", organization.0))
    }
}
