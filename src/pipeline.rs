// src/pipeline.rs
//
// Resolution pipeline driver. Records are processed strictly in order, one at
// a time: query, resolve, then persist, before the next record starts.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::client::{CompanyDirectory, QueryKind, QueryResult, RequestThrottle, ResponseRecorder};
use crate::config::{AppConfig, PROGRESS_EVERY, THROTTLE_EVERY};
use crate::error::SyncError;
use crate::matching::{extract_domain, DomainNormalizer, MatchResolver};
use crate::models::{HitCount, SourceRecord};
use crate::reference;
use crate::results::{RecordDelta, RunStatistics};
use crate::store::OrganizationStore;
use crate::sync::{OrganizationSync, ResolutionKeySets};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Records before this index are examined but skipped
    pub start_at: usize,
    /// Passed to domain queries as the provider's `updated_since`
    pub updated_since: Option<NaiveDate>,
    pub progress_every: usize,
    pub throttle_every: usize,
    pub throttle_pause: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            start_at: 0,
            updated_since: None,
            progress_every: PROGRESS_EVERY,
            throttle_every: THROTTLE_EVERY,
            throttle_pause: Duration::ZERO,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            throttle_pause: config.throttle_pause(),
            ..Default::default()
        }
    }
}

pub struct Pipeline<D, S> {
    directory: D,
    sync: OrganizationSync<S>,
    isp_domains: HashSet<String>,
    tld_file: PathBuf,
    // TLD set is read on first resolve, then reused for the rest of the run
    resolver: OnceCell<MatchResolver>,
    options: PipelineOptions,
    run_id: Uuid,
    synced_at: DateTime<Utc>,
}

impl<D: CompanyDirectory, S: OrganizationStore> Pipeline<D, S> {
    pub fn new(
        directory: D,
        store: S,
        isp_domains: HashSet<String>,
        tld_file: PathBuf,
        options: PipelineOptions,
    ) -> Self {
        Self {
            directory,
            sync: OrganizationSync::new(store),
            isp_domains,
            tld_file,
            resolver: OnceCell::new(),
            options,
            run_id: Uuid::new_v4(),
            synced_at: Utc::now(),
        }
    }

    /// Same as [`Pipeline::new`] with the resolver supplied up front, so no
    /// TLD file is read.
    pub fn with_resolver(
        directory: D,
        store: S,
        isp_domains: HashSet<String>,
        resolver: MatchResolver,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver: OnceCell::with_value(resolver),
            ..Self::new(directory, store, isp_domains, PathBuf::new(), options)
        }
    }

    pub fn store(&self) -> &S {
        self.sync.store()
    }

    pub fn into_store(self) -> S {
        self.sync.into_store()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn resolver(&self) -> Result<&MatchResolver, SyncError> {
        self.resolver.get_or_try_init(|| {
            let tlds = reference::load_tlds(&self.tld_file)?;
            info!("Loaded {} TLD suffixes from {}", tlds.len(), self.tld_file.display());
            Ok(MatchResolver::new(DomainNormalizer::new(tlds)))
        })
    }

    /// Processes every record and returns the run's tallies. Only fatal
    /// errors (unreadable reference data) end the run early; everything else
    /// is logged, counted, and the next record is processed.
    pub async fn run(
        &self,
        records: &[SourceRecord],
        recorder: &mut ResponseRecorder,
    ) -> Result<RunStatistics> {
        info!(
            "Run {} started: {} records, starting at {}",
            self.run_id,
            records.len(),
            self.options.start_at
        );
        let mut stats = RunStatistics::new();
        let mut keys = ResolutionKeySets::new();
        let mut throttle =
            RequestThrottle::new(self.options.throttle_every, self.options.throttle_pause);

        for (ix, record) in records.iter().enumerate() {
            let delta = if ix < self.options.start_at {
                RecordDelta::skipped()
            } else {
                self.process_record(&mut keys, recorder, record).await?
            };
            stats.apply(&delta);

            if self.options.progress_every > 0 && stats.examined % self.options.progress_every == 0
            {
                info!(
                    "{} items examined in {:.2} secs ({} items skipped)",
                    stats.examined,
                    stats.query_time.as_secs_f64(),
                    stats.skipped
                );
            }
            if !delta.skipped {
                throttle.after_record(stats.not_skipped).await;
            }
        }

        if let Err(e) = recorder.flush() {
            error!("Failed to write raw query responses: {:#}", e);
        }
        if !stats.is_consistent() {
            warn!(
                "Run {} tallies are inconsistent: {} examined, {} skipped",
                self.run_id, stats.examined, stats.skipped
            );
        }
        info!(
            "Run {} finished: {} examined, {} stored or updated, {} throttle pauses",
            self.run_id,
            stats.examined,
            stats.stored_or_updated(),
            throttle.pauses_taken()
        );
        Ok(stats)
    }

    async fn process_record(
        &self,
        keys: &mut ResolutionKeySets,
        recorder: &mut ResponseRecorder,
        record: &SourceRecord,
    ) -> Result<RecordDelta> {
        let Some(domain) = extract_domain(&record.email) else {
            warn!("Bad email address '{}'", record.email);
            return Ok(RecordDelta::bad_email());
        };
        let domain = domain.to_lowercase();

        // ISP domains are counted only; whether to look them up by company
        // name is still undecided.
        if self.isp_domains.contains(&domain) {
            debug!("{} is an ISP domain", domain);
            return Ok(RecordDelta {
                isp: true,
                ..Default::default()
            });
        }

        if !keys.mark_queried(&domain) {
            debug!("Repeat domain {}", domain);
            return Ok(RecordDelta {
                repeat_domain: true,
                ..Default::default()
            });
        }

        let mut delta = RecordDelta::default();
        let by_domain = self
            .query(QueryKind::Domain, &domain, &mut delta, recorder)
            .await;
        delta.domain_hits = Some(HitCount::from_len(by_domain.len()));

        // Only a domain miss falls back to the name query.
        let candidates = if by_domain.is_empty() {
            let by_name = self
                .query(QueryKind::Name, &record.company_name, &mut delta, recorder)
                .await;
            delta.name_hits = Some(HitCount::from_len(by_name.len()));
            by_name.items
        } else {
            by_domain.items
        };
        if candidates.is_empty() {
            return Ok(delta);
        }

        let resolver = self.resolver()?;
        let Some(picked) = resolver.resolve(&record.company_name, &domain, &candidates) else {
            info!(
                "{} -- {} CANNOT CHOOSE among {} candidate(s)",
                record.company_name,
                domain,
                candidates.len()
            );
            delta.unresolved = true;
            return Ok(delta);
        };
        info!(
            "{} -- {} I choose {}",
            record.company_name, domain, picked.candidate_name
        );

        let candidate = &candidates[picked.candidate_index];
        match self
            .sync
            .sync(keys, candidate, &record.company_name, self.synced_at)
            .await
        {
            Ok(outcome) => {
                debug!("{} sync outcome {}", domain, outcome.as_str());
                delta.sync = Some(outcome);
            }
            Err(e) => {
                error!("Failed to store organization for {}: {:#}", record.company_name, e);
                delta.store_error = true;
            }
        }
        Ok(delta)
    }

    /// Runs one provider query, timing it and keeping its raw response. A
    /// failed query is logged and counted, then treated as a miss.
    async fn query(
        &self,
        kind: QueryKind,
        key: &str,
        delta: &mut RecordDelta,
        recorder: &mut ResponseRecorder,
    ) -> QueryResult {
        let started = Instant::now();
        let result = match kind {
            QueryKind::Domain => {
                self.directory
                    .query_by_domain(key, self.options.updated_since)
                    .await
            }
            QueryKind::Name => self.directory.query_by_name(key).await,
        };
        delta.query_time += started.elapsed();

        match result {
            Ok(result) => {
                recorder.record(kind, &result.raw);
                result
            }
            Err(e) => {
                warn!("Query by {} '{}' failed: {:#}", kind.as_str(), key, e);
                delta.query_errors += 1;
                QueryResult::empty(0)
            }
        }
    }
}
