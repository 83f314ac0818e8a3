use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use watch_core::{ExtractionEngine, ExtractionRules, Record};
use watch_engine::{
    AnchorIndexSource, DedupStore, FailureKind, IndexSource, MemoryDedupStore, MemoryFetcher,
    MonitorTask, SqliteDedupStore, StaticIndexSource, TaskError,
};

const INDEX_URL: &str = "https://www.whitehouse.gov/briefing-room/presidential-actions/proclamations";
const DALLAS_URL: &str = "https://www.whitehouse.gov/the-press-office/2016/07/08/presidential-proclamation-honoring-victims-attack-dallas-texas";
const INDEX_HTML: &str = include_str!("data/index.html");
const DALLAS_HTML: &str = include_str!("data/dallas_flag.html");
const FLAG_DAY_HTML: &str = include_str!("data/flag_day.html");
const TIMEOUT: Duration = Duration::from_secs(60);

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 7, 9, 12, 0, 0).unwrap()
}

fn engine() -> ExtractionEngine {
    ExtractionEngine::new(ExtractionRules::default()).unwrap()
}

/// Serves the fixture index; the Dallas proclamation is the only half-staff
/// order, every other link gets the Flag Day proclamation.
fn fixture_fetcher() -> Arc<MemoryFetcher> {
    let fetcher = MemoryFetcher::new();
    fetcher.insert(INDEX_URL, INDEX_HTML);
    let source = AnchorIndexSource::new(INDEX_URL, "/the-press-office").unwrap();
    for link in source.scan(INDEX_HTML) {
        if link == DALLAS_URL {
            fetcher.insert(link, DALLAS_HTML);
        } else {
            fetcher.insert(link, FLAG_DAY_HTML);
        }
    }
    Arc::new(fetcher)
}

fn fixture_task(fetcher: Arc<MemoryFetcher>, store: Arc<dyn DedupStore>) -> MonitorTask {
    let index = AnchorIndexSource::new(INDEX_URL, "/the-press-office").unwrap();
    MonitorTask::new("flag", TIMEOUT, Box::new(index), engine(), fetcher, store)
}

fn static_task(
    urls: &[String],
    fetcher: Arc<MemoryFetcher>,
    store: Arc<dyn DedupStore>,
) -> MonitorTask {
    let index: Box<dyn IndexSource> = Box::new(StaticIndexSource::new(urls.iter().cloned()));
    MonitorTask::new("synthetic", TIMEOUT, index, engine(), fetcher, store)
}

fn half_staff_page(until: &str) -> String {
    format!(
        "<html><body><p>Intro.</p><p>In mourning, by the authority vested in me, the flag of the United States shall be flown at half-staff until {until}. Thereafter it shall be raised.</p></body></html>"
    )
}

fn urls(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://example.gov/the-press-office/{i}"))
        .collect()
}

#[tokio::test]
async fn fixture_index_yields_one_record_then_none() {
    init_logging();
    let store = Arc::new(MemoryDedupStore::new());
    let task = fixture_task(fixture_fetcher(), store.clone());

    let first = task.run(t0()).await.unwrap();
    let expected = engine()
        .extract_units(watch_engine::html_paragraphs(DALLAS_HTML).iter().map(String::as_str))
        .unwrap();
    assert_eq!(first, vec![expected]);
    assert_eq!(first[0].get("until"), Some("Sunset, July 12, 2016"));
    assert_eq!(
        first[0].get("why"),
        Some("As a mark of respect for the victims of the attack on police officers perpetrated on Thursday, July 7, 2016, in Dallas, Texas")
    );

    let second = task.run(t0() + TIMEOUT * 2).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(store.seen_count("flag"), 1);
}

#[tokio::test]
async fn every_candidate_is_fetched_in_index_order() {
    init_logging();
    let fetcher = fixture_fetcher();
    let task = fixture_task(fetcher.clone(), Arc::new(MemoryDedupStore::new()));

    task.run(t0()).await.unwrap();

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 11);
    assert_eq!(requests[0], INDEX_URL);
    assert_eq!(requests[1], DALLAS_URL);
}

#[tokio::test]
async fn new_records_come_back_in_reverse_discovery_order() {
    init_logging();
    let urls = urls(10);
    let fetcher = MemoryFetcher::new();
    for (i, url) in urls.iter().enumerate() {
        match i + 1 {
            3 => fetcher.insert(url.clone(), half_staff_page("sunset, march 3")),
            7 => fetcher.insert(url.clone(), half_staff_page("sunset, march 7")),
            _ => fetcher.insert(url.clone(), FLAG_DAY_HTML),
        }
    }
    let task = static_task(&urls, Arc::new(fetcher), Arc::new(MemoryDedupStore::new()));

    let records = task.run(t0()).await.unwrap();

    let untils: Vec<_> = records.iter().map(|r| r.get("until").unwrap()).collect();
    assert_eq!(untils, vec!["Sunset, March 7", "Sunset, March 3"]);
}

#[tokio::test]
async fn identical_records_from_two_documents_are_reported_once() {
    init_logging();
    let urls = urls(2);
    let fetcher = MemoryFetcher::new();
    fetcher.insert(urls[0].clone(), DALLAS_HTML);
    fetcher.insert(urls[1].clone(), DALLAS_HTML);
    let task = static_task(&urls, Arc::new(fetcher), Arc::new(MemoryDedupStore::new()));

    assert_eq!(task.run(t0()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reported_records_never_reappear_when_index_grows() {
    init_logging();
    let store: Arc<dyn DedupStore> = Arc::new(MemoryDedupStore::new());
    let mut urls = urls(2);
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert(urls[0].clone(), half_staff_page("noon, april 2"));
    fetcher.insert(urls[1].clone(), half_staff_page("noon, april 1"));

    let first = static_task(&urls, fetcher.clone(), store.clone())
        .run(t0())
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    let newest = "https://example.gov/the-press-office/new".to_string();
    fetcher.insert(newest.clone(), half_staff_page("noon, april 3"));
    urls.insert(0, newest);

    let second = static_task(&urls, fetcher, store)
        .run(t0() + TIMEOUT * 2)
        .await
        .unwrap();
    let untils: Vec<_> = second.iter().map(|r| r.get("until").unwrap()).collect();
    assert_eq!(untils, vec!["Noon, April 3"]);
}

#[tokio::test]
async fn fetch_failure_keeps_earlier_registrations() {
    init_logging();
    let urls = urls(5);
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert(urls[0].clone(), half_staff_page("dawn, may 1"));
    fetcher.insert(urls[1].clone(), half_staff_page("dawn, may 2"));
    fetcher.fail(urls[2].clone());
    fetcher.insert(urls[3].clone(), half_staff_page("dawn, may 4"));
    fetcher.insert(urls[4].clone(), half_staff_page("dawn, may 5"));
    let store = Arc::new(MemoryDedupStore::new());
    let task = static_task(&urls, fetcher.clone(), store.clone());

    let err = task.run(t0()).await.unwrap_err();
    match err {
        TaskError::Fetch(err) => assert_eq!(err.kind, FailureKind::Network),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.seen_count("synthetic"), 2);
    assert!(!fetcher.requests().contains(&urls[3]));

    fetcher.insert(urls[2].clone(), FLAG_DAY_HTML);
    let retried = task.run(t0() + TIMEOUT * 2).await.unwrap();
    let untils: Vec<_> = retried.iter().map(|r| r.get("until").unwrap()).collect();
    assert_eq!(untils, vec!["Dawn, May 5", "Dawn, May 4"]);
}

#[tokio::test]
async fn run_is_gated_by_timeout() {
    init_logging();
    let task = fixture_task(fixture_fetcher(), Arc::new(MemoryDedupStore::new()));

    assert!(task.should_run(t0()).unwrap());
    task.run(t0()).await.unwrap();

    assert!(!task.should_run(t0()).unwrap());
    assert!(!task.should_run(t0() + TIMEOUT - Duration::from_secs(1)).unwrap());
    assert!(!task.should_run(t0() + TIMEOUT).unwrap());
    assert!(task.should_run(t0() + TIMEOUT + Duration::from_secs(1)).unwrap());
}

#[tokio::test]
async fn run_start_is_recorded_even_when_the_cycle_fails() {
    init_logging();
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.fail(INDEX_URL);
    let task = fixture_task(fetcher, Arc::new(MemoryDedupStore::new()));

    assert!(task.run(t0()).await.is_err());
    assert!(!task.should_run(t0() + TIMEOUT).unwrap());
}

#[tokio::test]
async fn sqlite_history_survives_restart() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("data").join("watch.db");

    {
        let store = Arc::new(SqliteDedupStore::open(&db).unwrap());
        let task = fixture_task(fixture_fetcher(), store);
        assert_eq!(task.run(t0()).await.unwrap().len(), 1);
    }

    let store = Arc::new(SqliteDedupStore::open(&db).unwrap());
    let task = fixture_task(fixture_fetcher(), store.clone());
    assert!(!task.should_run(t0() + TIMEOUT).unwrap());
    assert!(task.run(t0() + TIMEOUT * 2).await.unwrap().is_empty());

    let history = store.history("flag").unwrap();
    assert_eq!(history.len(), 1);
    let record = Record::from_fingerprint(&history[0].fingerprint).unwrap();
    assert_eq!(record.get("until"), Some("Sunset, July 12, 2016"));
    assert_eq!(history[0].seen_at, t0());
}

#[tokio::test]
async fn sub_millisecond_run_start_keeps_the_boundary_strict() {
    init_logging();
    let start = t0() + chrono::Duration::microseconds(500);
    let stores: Vec<Arc<dyn DedupStore>> = vec![
        Arc::new(MemoryDedupStore::new()),
        Arc::new(SqliteDedupStore::open_in_memory().unwrap()),
    ];

    for store in stores {
        let task = fixture_task(fixture_fetcher(), store);
        task.run(start).await.unwrap();

        assert!(!task.should_run(start + TIMEOUT).unwrap());
        assert!(task
            .should_run(start + TIMEOUT + Duration::from_nanos(1))
            .unwrap());
    }
}
