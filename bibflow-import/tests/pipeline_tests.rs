// Pipeline Integration Tests
//
// End-to-end acquisition through the `Pipeline` facade with scripted fetchers:
// identifier dispatch, entry completion, search, full-text resolution and file
// import with creation-date stamping.

mod helpers;

use bibflow_common::config::FetchConfig;
use bibflow_common::time::FixedClock;
use bibflow_common::{Field, Identifier, IdentifierKind, Record};
use bibflow_import::fetcher::transport::Transport;
use bibflow_import::fetcher::{EntryBasedFetcher, FetcherRegistry, TrustLevel};
use bibflow_import::workflow::PipelineEvent;
use bibflow_import::{FetcherError, Pipeline, PipelineConfig};
use helpers::{
    article, capture_logs, MockFetcher, MockFulltext, MockSearch, RecordingTransport,
    LEGACY_DATABASE,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

fn stamping() -> PipelineConfig {
    PipelineConfig {
        add_creation_date: true,
        ..Default::default()
    }
}

fn pipeline(registry: FetcherRegistry, config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, Arc::new(registry))
        .with_clock(Arc::new(FixedClock::on_date(2024, 2, 29).unwrap()))
}

fn drain(rx: &mut mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_isbn_field_goes_to_isbn_fetcher_only() {
    let isbn = MockFetcher::found("ISBN", article("SICP", "1985"));
    let doi = MockFetcher::found("DOI", article("Wrong", "2000"));
    let registry = FetcherRegistry::builder()
        .register_for_identifier(IdentifierKind::Isbn, isbn.clone())
        .register_for_identifier(IdentifierKind::Doi, doi.clone())
        .build()
        .unwrap();
    let pipeline = pipeline(registry, stamping());

    let record = pipeline
        .fetch_by_field(&Field::Isbn, "978-0-262-51087-5")
        .await
        .expect("ISBN has a fetcher")
        .unwrap()
        .unwrap();

    assert_eq!(record.field(&Field::Title), Some("SICP"));
    assert_eq!(record.field(&Field::CreationDate), Some("2024-02-29"));
    assert_eq!(isbn.seen(), vec!["9780262510875"], "fetchers get the normalized value");
    assert_eq!(doi.calls(), 0);
}

#[tokio::test]
async fn test_title_has_no_fetcher() {
    let isbn = MockFetcher::found("ISBN", article("SICP", "1985"));
    let registry = FetcherRegistry::builder()
        .register_for_identifier(IdentifierKind::Isbn, isbn.clone())
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    assert!(pipeline.fetch_by_field(&Field::Title, "SICP").await.is_none());
    assert_eq!(isbn.calls(), 0);
}

#[tokio::test]
async fn test_failed_fetch_is_reported() {
    let (logs, _guard) = capture_logs();
    let (tx, mut rx) = mpsc::channel(8);
    let registry = FetcherRegistry::builder()
        .register_for_identifier(IdentifierKind::Doi, MockFetcher::failing("DOI"))
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default()).with_events(tx);

    let result = pipeline.fetch_by_field(&Field::Doi, "10.1/x").await.unwrap();

    assert!(matches!(result, Err(FetcherError::MalformedResponse { .. })));
    assert!(logs.count_with_field(Level::WARN, "fetcher", "DOI") >= 1);
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [PipelineEvent::ProviderFailed { fetcher, .. }] if fetcher == "DOI"
    ));
}

#[tokio::test]
async fn test_unread_event_channel_does_not_stall_fetches() {
    let (tx, mut rx) = mpsc::channel(1);
    let registry = FetcherRegistry::builder()
        .register_for_identifier(IdentifierKind::Doi, MockFetcher::failing("DOI"))
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default()).with_events(tx);

    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        for _ in 0..3 {
            assert!(pipeline.fetch_by_field(&Field::Doi, "10.1/x").await.is_some());
        }
    })
    .await;

    assert!(finished.is_ok(), "fetches waited on a full event channel");
    assert_eq!(drain(&mut rx).len(), 1, "later events are dropped, not queued");
}

#[tokio::test]
async fn test_complete_entry_first_hit_wins() {
    let first = MockFetcher::not_found("A");
    let second = MockFetcher::found("B", article("Completed", "2010"));
    let third = MockFetcher::found("C", article("Unreached", "2011"));
    let registry = FetcherRegistry::builder()
        .register_entry_based(first.clone() as Arc<dyn EntryBasedFetcher>)
        .register_entry_based(third.clone() as Arc<dyn EntryBasedFetcher>)
        .register_entry_based(second.clone() as Arc<dyn EntryBasedFetcher>)
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    let record = pipeline
        .complete_entry(&article("Partial", "2010"))
        .await
        .unwrap()
        .unwrap();

    // registry order is by name: A, B, C
    assert_eq!(record.field(&Field::Title), Some("Completed"));
    assert_eq!(third.calls(), 0);
}

#[tokio::test]
async fn test_complete_entry_all_failed() {
    let registry = FetcherRegistry::builder()
        .register_entry_based(MockFetcher::failing("A") as Arc<dyn EntryBasedFetcher>)
        .register_entry_based(MockFetcher::failing("B") as Arc<dyn EntryBasedFetcher>)
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    match pipeline.complete_entry(&article("Partial", "2010")).await {
        Err(FetcherError::ChainExhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected ChainExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_complete_entry_failure_and_not_found() {
    let registry = FetcherRegistry::builder()
        .register_entry_based(MockFetcher::failing("A") as Arc<dyn EntryBasedFetcher>)
        .register_entry_based(MockFetcher::not_found("B") as Arc<dyn EntryBasedFetcher>)
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    assert!(pipeline
        .complete_entry(&article("Partial", "2010"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_junk_doi_does_not_block_isbn_completion() {
    let transport = RecordingTransport::new();
    let registry = FetcherRegistry::with_defaults(
        &FetchConfig::default(),
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());
    let book = Record::new("book")
        .with_field(Field::Doi, "n/a")
        .with_field(Field::Isbn, "9781098151409");

    let result = pipeline.complete_entry(&book).await;

    assert!(matches!(result, Ok(None)), "got {:?}", result);
    let urls = transport.urls();
    assert!(
        urls.iter().any(|u| u.starts_with("https://www.ebook.de/") && u.ends_with("9781098151409")),
        "ISBN catalogues were never asked: {:?}",
        urls
    );
}

#[tokio::test]
async fn test_find_identifier_uses_finder_for_kind() {
    let transport = RecordingTransport::new();
    let registry = FetcherRegistry::with_defaults(
        &FetchConfig::default(),
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());
    let preprint = article("Attention Is All You Need", "2017")
        .with_field(Field::Eprint, "arXiv:1706.03762");

    let found = pipeline
        .find_identifier(IdentifierKind::ArXiv, &preprint)
        .await
        .expect("arXiv ids have a finder")
        .unwrap();
    assert_eq!(found, Some(Identifier::new(IdentifierKind::ArXiv, "1706.03762")));
    assert!(transport.urls().is_empty());

    assert!(pipeline
        .find_identifier(IdentifierKind::Isbn, &preprint)
        .await
        .is_none());
}

#[tokio::test]
async fn test_search_merges_stamps_and_reports() {
    let (tx, mut rx) = mpsc::channel(8);
    let registry = FetcherRegistry::builder()
        .register_search_based(
            MockSearch::returning("Beta", vec![article("second", "2002")]).build(),
        )
        .register_search_based(
            MockSearch::returning("Alpha", vec![article("first", "2001")]).build(),
        )
        .build()
        .unwrap();
    let pipeline = pipeline(registry, stamping()).with_events(tx);

    let results = pipeline.search("distributed", None).await.unwrap();

    let titles: Vec<_> = results
        .records
        .iter()
        .map(|r| r.field(&Field::Title).unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "second"]);
    assert!(results
        .records
        .iter()
        .all(|r| r.field(&Field::CreationDate) == Some("2024-02-29")));
    assert_eq!(
        drain(&mut rx),
        vec![PipelineEvent::SearchCompleted {
            query: "distributed".into(),
            results: 2,
            partial_failure: false,
        }]
    );
}

#[tokio::test]
async fn test_search_respects_explicit_maximum() {
    let registry = FetcherRegistry::builder()
        .register_search_based(
            MockSearch::returning(
                "Only",
                vec![article("a", "1"), article("b", "2"), article("c", "3")],
            )
            .build(),
        )
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    let results = pipeline.search("q", Some(2)).await.unwrap();
    assert_eq!(results.records.len(), 2);
}

#[tokio::test]
async fn test_full_text_prefers_trusted_and_skips_failures() {
    let meta = MockFulltext::new("Meta", TrustLevel::MetaSearch, Some("https://meta.example/a.pdf"));
    let broken = MockFulltext::failing("Broken", TrustLevel::Source);
    let preprint = MockFulltext::new("Preprint", TrustLevel::Preprint, Some("https://arxiv.org/pdf/1"));
    let registry = FetcherRegistry::builder()
        .register_fulltext(meta.clone())
        .register_fulltext(broken.clone())
        .register_fulltext(preprint)
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    let location = pipeline
        .resolve_full_text(&article("Paper", "2020"))
        .await
        .unwrap();

    assert_eq!(location.fetcher, "Preprint");
    assert_eq!(location.url.as_str(), "https://arxiv.org/pdf/1");
    assert_eq!(broken.calls(), 1);
    assert_eq!(meta.calls(), 0);
}

#[tokio::test]
async fn test_full_text_none_anywhere() {
    let registry = FetcherRegistry::builder()
        .register_fulltext(MockFulltext::new("Empty", TrustLevel::Publisher, None))
        .build()
        .unwrap();
    let pipeline = pipeline(registry, PipelineConfig::default());

    assert!(pipeline.resolve_full_text(&Record::new("misc")).await.is_none());
}

#[tokio::test]
async fn test_import_file_migrates_and_stamps() {
    let mut file = tempfile::Builder::new().suffix(".bib").tempfile().unwrap();
    file.write_all(LEGACY_DATABASE.as_bytes()).unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    let pipeline = pipeline(FetcherRegistry::builder().build().unwrap(), stamping())
        .with_events(tx);

    let result = pipeline.import_file(file.path()).await.unwrap();

    assert!(result.is_successful());
    assert_eq!(result.format, Some("bibtex"));
    for record in result.records() {
        assert_eq!(record.field(&Field::CreationDate), Some("2024-02-29"));
    }
    assert!(result.collection.metadata.group_root("Markings").is_some());
    assert_eq!(
        drain(&mut rx),
        vec![PipelineEvent::FileImported {
            path: file.path().to_path_buf(),
            records: 2,
            failed: false,
        }]
    );
}

#[tokio::test]
async fn test_open_database_does_not_stamp() {
    let mut file = tempfile::Builder::new().suffix(".bib").tempfile().unwrap();
    file.write_all(LEGACY_DATABASE.as_bytes()).unwrap();
    let pipeline = pipeline(FetcherRegistry::builder().build().unwrap(), stamping());

    let result = pipeline.open_database(file.path()).await.unwrap();

    assert_eq!(result.records().len(), 2);
    assert!(result
        .records()
        .iter()
        .all(|r| !r.has_field(&Field::CreationDate)));
}

#[tokio::test]
async fn test_existing_creation_date_kept() {
    let pipeline = pipeline(FetcherRegistry::builder().build().unwrap(), stamping());
    let result = pipeline.import_bytes(b"@misc{k, creationdate = {2001-01-01}}");
    assert_eq!(
        result.records()[0].field(&Field::CreationDate),
        Some("2001-01-01")
    );
}
