// tests/pipeline_tests.rs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orglink_lib::client::{AuditTarget, CompanyDirectory, QueryKind, QueryResult, ResponseRecorder};
use orglink_lib::matching::{DomainNormalizer, MatchResolver};
use orglink_lib::pipeline::{Pipeline, PipelineOptions};
use orglink_lib::store::memory::StoreWrite;
use orglink_lib::store::InMemoryOrganizationStore;
use orglink_lib::{CandidateOrganization, OrganizationStore, SourceRecord, SyncError};

type CallLog = Arc<Mutex<Vec<(QueryKind, String)>>>;

// Directory that answers from fixed tables and remembers what it was asked
#[derive(Default)]
struct ScriptedDirectory {
    by_domain: HashMap<String, Vec<CandidateOrganization>>,
    by_name: HashMap<String, Vec<CandidateOrganization>>,
    failing: HashSet<String>,
    calls: CallLog,
}

impl ScriptedDirectory {
    fn domain(mut self, domain: &str, items: Vec<CandidateOrganization>) -> Self {
        self.by_domain.insert(domain.to_string(), items);
        self
    }

    fn name(mut self, name: &str, items: Vec<CandidateOrganization>) -> Self {
        self.by_name.insert(name.to_string(), items);
        self
    }

    fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    fn answer(&self, kind: QueryKind, key: &str) -> Result<QueryResult> {
        self.calls.lock().unwrap().push((kind, key.to_string()));
        if self.failing.contains(key) {
            return Err(anyhow!("connection reset while querying {}", key));
        }
        let table = match kind {
            QueryKind::Domain => &self.by_domain,
            QueryKind::Name => &self.by_name,
        };
        let items = table.get(key).cloned().unwrap_or_default();
        let raw = json!({
            "data": {
                "items": items.iter().map(|c| json!({"properties": c})).collect::<Vec<Value>>()
            }
        });
        Ok(QueryResult {
            items,
            raw_status: 200,
            raw,
        })
    }
}

#[async_trait]
impl CompanyDirectory for ScriptedDirectory {
    async fn query_by_domain(&self, domain: &str, _since: Option<NaiveDate>) -> Result<QueryResult> {
        self.answer(QueryKind::Domain, domain)
    }

    async fn query_by_name(&self, name: &str) -> Result<QueryResult> {
        self.answer(QueryKind::Name, name)
    }
}

fn resolver() -> MatchResolver {
    MatchResolver::new(DomainNormalizer::from_tokens(["com", "io", "co", "uk", "inc"]))
}

fn isps() -> HashSet<String> {
    ["gmail.com", "yahoo.com"].iter().map(|s| s.to_string()).collect()
}

fn directory() -> ScriptedDirectory {
    ScriptedDirectory::default()
        .domain("acme.com", vec![CandidateOrganization::named("Acme", "acme.com")])
        .domain(
            "ambig.com",
            vec![
                CandidateOrganization::named("Ambig Corp", "ambig.com"),
                CandidateOrganization::named("Ambig Industries", "ambig-industries.com"),
            ],
        )
        .name(
            "Zenith Labs",
            vec![CandidateOrganization::named("Zenith Labs", "zenith.io/")],
        )
}

fn mixed_feed() -> Vec<SourceRecord> {
    vec![
        SourceRecord::new("ops@acme.com", "Acme Corp"),
        SourceRecord::new("not-an-email", "Broken Inc"),
        SourceRecord::new("jane@gmail.com", "Jane Consulting"),
        SourceRecord::new("dev@ACME.com", "Acme Corp"),
        SourceRecord::new("x@zenith.io", "Zenith Labs"),
        SourceRecord::new("y@ambig.com", "Ambig"),
    ]
}

async fn store_with_licenses(companies: &[&str]) -> InMemoryOrganizationStore {
    let store = InMemoryOrganizationStore::new();
    for company in companies {
        store.add_license(company).await;
    }
    store
}

fn options() -> PipelineOptions {
    PipelineOptions::default()
}

#[tokio::test]
async fn test_mixed_feed_tallies() {
    let store = store_with_licenses(&["Acme Corp"]).await;
    let dir = directory();
    let calls = dir.call_log();
    let pipeline = Pipeline::with_resolver(dir, store, isps(), resolver(), options());

    let stats = pipeline
        .run(&mixed_feed(), &mut ResponseRecorder::default())
        .await
        .unwrap();

    assert_eq!(stats.examined, 6);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.bad_emails, 1);
    assert_eq!(stats.isps, 1);
    assert_eq!(stats.repeat_domains, 1);
    assert_eq!(stats.domain_single, 1);
    assert_eq!(stats.domain_misses, 1);
    assert_eq!(stats.domain_multiple, 1);
    assert_eq!(stats.name_queries, 1);
    assert_eq!(stats.name_single, 1);
    assert_eq!(stats.stored, 1);
    // Zenith Labs has no license contact row
    assert_eq!(stats.orphans_removed, 1);
    assert_eq!(stats.unresolved, 1);
    assert!(stats.is_consistent());

    assert!(pipeline.store().exists("acme.com").await.unwrap());
    assert!(!pipeline.store().exists("zenith.io").await.unwrap());

    // ambig.com had domain hits, so no name query was issued for it
    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            (QueryKind::Domain, "acme.com".to_string()),
            (QueryKind::Domain, "zenith.io".to_string()),
            (QueryKind::Name, "Zenith Labs".to_string()),
            (QueryKind::Domain, "ambig.com".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_second_run_writes_nothing() {
    let store = store_with_licenses(&["Acme Corp"]).await;
    let feed = vec![SourceRecord::new("ops@acme.com", "Acme Corp")];

    let first = Pipeline::with_resolver(directory(), store, isps(), resolver(), options());
    let stats = first.run(&feed, &mut ResponseRecorder::default()).await.unwrap();
    assert_eq!(stats.stored, 1);
    let store = first.into_store();
    let writes_after_first = store.writes().await;

    let second = Pipeline::with_resolver(directory(), store, isps(), resolver(), options());
    let stats = second.run(&feed, &mut ResponseRecorder::default()).await.unwrap();
    assert_eq!(stats.stored, 0);
    assert_eq!(stats.unchanged, 1);
    assert_eq!(second.store().writes().await, writes_after_first);
    assert_eq!(second.store().organization_count().await, 1);
}

#[tokio::test]
async fn test_start_offset_skips_records() {
    let dir = directory();
    let calls = dir.call_log();
    let opts = PipelineOptions {
        start_at: 2,
        ..options()
    };
    let pipeline = Pipeline::with_resolver(
        dir,
        InMemoryOrganizationStore::new(),
        isps(),
        resolver(),
        opts,
    );
    let feed = vec![
        SourceRecord::new("ops@acme.com", "Acme Corp"),
        SourceRecord::new("y@ambig.com", "Ambig"),
        SourceRecord::new("x@zenith.io", "Zenith Labs"),
    ];

    let stats = pipeline.run(&feed, &mut ResponseRecorder::default()).await.unwrap();
    assert_eq!(stats.examined, 3);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.domain_misses, 1);
    assert!(stats.is_consistent());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_query_failure_counts_as_miss() {
    let dir = directory().failing("acme.com");
    let calls = dir.call_log();
    let store = store_with_licenses(&["Acme Corp"]).await;
    let pipeline = Pipeline::with_resolver(dir, store, isps(), resolver(), options());

    let stats = pipeline
        .run(
            &[SourceRecord::new("ops@acme.com", "Acme Corp")],
            &mut ResponseRecorder::default(),
        )
        .await
        .unwrap();
    assert_eq!(stats.query_errors, 1);
    assert_eq!(stats.domain_misses, 1);
    assert_eq!(stats.name_misses, 1);
    assert!(stats.is_consistent());
    assert_eq!(calls.lock().unwrap()[1], (QueryKind::Name, "Acme Corp".to_string()));
}

#[tokio::test]
async fn test_store_failure_does_not_stop_run() {
    let store = store_with_licenses(&["Acme Corp", "Zenith Labs"]).await;
    store.fail_writes_for("acme.com").await;
    let pipeline = Pipeline::with_resolver(directory(), store, isps(), resolver(), options());

    let feed = vec![
        SourceRecord::new("ops@acme.com", "Acme Corp"),
        SourceRecord::new("x@zenith.io", "Zenith Labs"),
    ];
    let stats = pipeline.run(&feed, &mut ResponseRecorder::default()).await.unwrap();
    assert_eq!(stats.store_errors, 1);
    assert_eq!(stats.stored, 1);
    assert!(pipeline.store().exists("zenith.io").await.unwrap());
    assert_eq!(
        pipeline.store().writes().await.first(),
        Some(&StoreWrite::Insert("zenith.io".to_string()))
    );
}

#[tokio::test]
async fn test_unreadable_stored_row_does_not_stop_run() {
    let store = store_with_licenses(&["Acme Corp", "Zenith Labs"]).await;
    store.fail_lookups_for("acme.com").await;
    let pipeline = Pipeline::with_resolver(directory(), store, isps(), resolver(), options());

    let feed = vec![
        SourceRecord::new("ops@acme.com", "Acme Corp"),
        SourceRecord::new("x@zenith.io", "Zenith Labs"),
    ];
    let stats = pipeline.run(&feed, &mut ResponseRecorder::default()).await.unwrap();
    assert_eq!(stats.store_errors, 1);
    assert_eq!(stats.stored, 1);
    assert!(stats.is_consistent());
    assert!(pipeline.store().exists("zenith.io").await.unwrap());
}

#[tokio::test]
async fn test_raw_responses_written_as_json_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let domain_file = dir.path().join("domains.json");
    let name_file = dir.path().join("names.json");
    let mut recorder = ResponseRecorder::new(
        AuditTarget {
            file: Some(domain_file.clone()),
            to_stdout: false,
        },
        AuditTarget {
            file: Some(name_file.clone()),
            to_stdout: false,
        },
    );
    let pipeline = Pipeline::with_resolver(
        directory(),
        InMemoryOrganizationStore::new(),
        isps(),
        resolver(),
        options(),
    );

    pipeline.run(&mixed_feed(), &mut recorder).await.unwrap();

    let domains: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&domain_file).unwrap()).unwrap();
    let names: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&name_file).unwrap()).unwrap();
    assert_eq!(domains.len(), 3);
    assert_eq!(names.len(), 1);
    assert_eq!(names[0]["data"]["items"][0]["properties"]["name"], "Zenith Labs");
}

#[tokio::test(start_paused = true)]
async fn test_throttle_pauses_every_n_processed_records() {
    let opts = PipelineOptions {
        throttle_every: 2,
        throttle_pause: Duration::from_secs(60),
        ..options()
    };
    let pipeline = Pipeline::with_resolver(
        ScriptedDirectory::default(),
        InMemoryOrganizationStore::new(),
        isps(),
        resolver(),
        opts,
    );
    let feed = vec![
        SourceRecord::new("a@one.com", "One"),
        SourceRecord::new("bad", "Bad"),
        SourceRecord::new("b@two.com", "Two"),
        SourceRecord::new("c@three.com", "Three"),
        SourceRecord::new("d@four.com", "Four"),
    ];

    let started = tokio::time::Instant::now();
    pipeline.run(&feed, &mut ResponseRecorder::default()).await.unwrap();
    // Four processed records, bad email excluded: two pauses
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert!(started.elapsed() < Duration::from_secs(180));
}

#[tokio::test]
async fn test_tld_list_loaded_lazily() {
    let dir = tempfile::tempdir().unwrap();
    let tld_file = dir.path().join("tlds.txt");
    std::fs::write(&tld_file, "# suffixes\ncom\nio\n").unwrap();
    let store = store_with_licenses(&["Acme Corp"]).await;
    let pipeline = Pipeline::new(directory(), store, isps(), tld_file, options());

    let stats = pipeline
        .run(
            &[SourceRecord::new("ops@acme.com", "Acme Corp")],
            &mut ResponseRecorder::default(),
        )
        .await
        .unwrap();
    assert_eq!(stats.stored, 1);
}

#[tokio::test]
async fn test_bad_tld_list_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let tld_file = dir.path().join("tlds.txt");
    std::fs::write(&tld_file, "com\n__import__\n").unwrap();
    let pipeline = Pipeline::new(
        directory(),
        InMemoryOrganizationStore::new(),
        isps(),
        tld_file,
        options(),
    );

    let err = pipeline
        .run(
            &[SourceRecord::new("ops@acme.com", "Acme Corp")],
            &mut ResponseRecorder::default(),
        )
        .await
        .unwrap_err();
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::ReferenceData { line, .. }) => assert_eq!(*line, 2),
        other => panic!("expected ReferenceData error, got {:?}", other),
    }
}
