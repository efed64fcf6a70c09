// src/models.rs

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use postgres_types::{FromSql, IsNull, ToSql, Type};
use serde::{Deserialize, Serialize};
use std::error::Error;

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------

/// Primary key of a row in `organizations`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub i64);

impl ToSql for OrganizationId {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.0.to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.0.to_sql_checked(ty, out)
    }
}

impl<'a> FromSql<'a> for OrganizationId {
    fn from_sql(ty: &Type, raw: &[u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let id = i64::from_sql(ty, raw)?;
        Ok(OrganizationId(id))
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}

/// Primary key of a row in `license_contact_details`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LicenseContactId(pub i64);

//------------------------------------------------------------------------------
// CORE DOMAIN MODELS
//------------------------------------------------------------------------------

/// One company read from the licensing feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// Technical contact email; its domain drives the provider lookup
    pub email: String,
    /// Company name as written on the license
    pub company_name: String,
}

impl SourceRecord {
    pub fn new(email: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            company_name: company_name.into(),
        }
    }
}

/// An organization as returned by the company-data provider.
///
/// Field names follow the provider's `properties` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOrganization {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub primary_role: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default, rename = "city_name")]
    pub city: Option<String>,
    #[serde(default, rename = "region_name")]
    pub region: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub stock_exchange: Option<String>,
    #[serde(default)]
    pub stock_symbol: Option<String>,
    /// Provider-side creation time, epoch seconds
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Provider-side modification time, epoch seconds
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl CandidateOrganization {
    /// Convenience constructor used by tests and fakes.
    pub fn named(name: &str, domain: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            domain: Some(domain.to_string()),
            ..Default::default()
        }
    }

    /// Name with surrounding whitespace removed, or "" when absent.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().map(str::trim).unwrap_or("")
    }
}

/// A row of the `organizations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub name: String,
    /// Unique key of the table
    pub domain: String,
    pub primary_role: Option<String>,
    pub short_description: Option<String>,
    pub homepage_url: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub api_url: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub stock_exchange: Option<String>,
    pub stock_symbol: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub last_synced_at: DateTime<Utc>,
}

impl OrganizationRecord {
    /// Builds the row to store for a provider candidate.
    ///
    /// Returns `None` when the candidate has no name or no domain; such a
    /// record can't be keyed or linked. Trailing slashes are stripped from
    /// the domain.
    pub fn from_candidate(
        candidate: &CandidateOrganization,
        synced_at: DateTime<Utc>,
    ) -> Option<Self> {
        let name = candidate.name.as_deref()?.trim();
        let domain = candidate.domain.as_deref()?.trim().trim_end_matches('/');
        if name.is_empty() || domain.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            domain: domain.to_string(),
            primary_role: candidate.primary_role.clone(),
            short_description: candidate.short_description.clone(),
            homepage_url: candidate.homepage_url.clone(),
            facebook_url: candidate.facebook_url.clone(),
            twitter_url: candidate.twitter_url.clone(),
            linkedin_url: candidate.linkedin_url.clone(),
            api_url: candidate.api_url.clone(),
            city: candidate.city.clone(),
            region: candidate.region.clone(),
            country: candidate.country_code.clone(),
            stock_exchange: candidate.stock_exchange.clone(),
            stock_symbol: candidate.stock_symbol.clone(),
            created_at: candidate.created_at,
            updated_at: candidate.updated_at,
            last_synced_at: synced_at,
        })
    }

    /// Field-by-field comparison of provider content. `last_synced_at` is
    /// bookkeeping and never counts as a change.
    pub fn differs_from(&self, stored: &OrganizationRecord) -> bool {
        self.name != stored.name
            || self.domain != stored.domain
            || self.primary_role != stored.primary_role
            || self.short_description != stored.short_description
            || self.homepage_url != stored.homepage_url
            || self.facebook_url != stored.facebook_url
            || self.twitter_url != stored.twitter_url
            || self.linkedin_url != stored.linkedin_url
            || self.api_url != stored.api_url
            || self.city != stored.city
            || self.region != stored.region
            || self.country != stored.country
            || self.stock_exchange != stored.stock_exchange
            || self.stock_symbol != stored.stock_symbol
            || self.created_at != stored.created_at
            || self.updated_at != stored.updated_at
    }
}

/// The single candidate chosen for a source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMatch {
    /// Position of the candidate in the provider's item list
    pub candidate_index: usize,
    pub candidate_name: String,
}

/// How many items a provider query returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitCount {
    Miss,
    Single,
    Multiple,
}

impl HitCount {
    pub fn from_len(len: usize) -> Self {
        match len {
            0 => HitCount::Miss,
            1 => HitCount::Single,
            _ => HitCount::Multiple,
        }
    }
}

/// Terminal state of the upsert layer for one resolved candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Inserted and linked to exactly one license
    Stored(OrganizationId),
    /// Already stored, content changed, row rewritten
    Updated,
    /// Already stored and identical; nothing written
    Unchanged,
    /// Inserted, then deleted because it could not be linked to exactly one license
    OrphanRemoved,
    /// Candidate lacks a name or domain and cannot be stored
    Incomplete,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Stored(_) => "STORED",
            SyncOutcome::Updated => "UPDATED",
            SyncOutcome::Unchanged => "SKIPPED",
            SyncOutcome::OrphanRemoved => "ORPHAN_REMOVED",
            SyncOutcome::Incomplete => "INCOMPLETE",
        }
    }
}
