//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to emulate the topics endpoint (a descending
//! history honoring `end_time` and `count`), file download URL resolution
//! and binary downloads, and run the crawler end-to-end.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};
use zsxq_harvest::config::{CrawlSection, CrawlerSettings};
use zsxq_harvest::output::{Category, ProgressSink, Severity};
use zsxq_harvest::{ConflictResolver, CrawlConfig, Crawler, RunOutcome};

const GROUP: &str = "51122858222824";

/// Serves a fixed history newest-first, like the real topics endpoint
struct FakeHistory {
    topics: Vec<Value>,
}

impl FakeHistory {
    fn new(mut topics: Vec<Value>) -> Self {
        topics.sort_by(|a, b| b["create_time"].as_str().cmp(&a["create_time"].as_str()));
        Self { topics }
    }

    fn page(&self, request: &Request) -> Value {
        let mut end_time: Option<String> = None;
        let mut count = 30;
        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "end_time" => end_time = Some(value.into_owned()),
                "count" => count = value.parse().unwrap_or(30),
                _ => {}
            }
        }

        let topics: Vec<&Value> = self
            .topics
            .iter()
            .filter(|topic| match &end_time {
                Some(cursor) => topic["create_time"].as_str().unwrap() <= cursor.as_str(),
                None => true,
            })
            .take(count)
            .collect();

        json!({"succeeded": true, "resp_data": {"topics": topics}})
    }
}

impl Respond for FakeHistory {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(self.page(request))
    }
}

/// Answers the first `failures` requests with the given body, then serves the history
struct FlakyHistory {
    history: FakeHistory,
    failures: usize,
    failure_body: String,
    calls: Arc<AtomicUsize>,
}

impl Respond for FlakyHistory {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            ResponseTemplate::new(200).set_body_string(self.failure_body.clone())
        } else {
            self.history.respond(request)
        }
    }
}

#[derive(Default)]
struct RecordingResolver {
    abort_on_duplicate: bool,
    truncate_existing: bool,
    duplicates: Mutex<Vec<String>>,
    documents: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ConflictResolver for RecordingResolver {
    async fn on_duplicate(&self, create_time: &str) -> bool {
        self.duplicates.lock().unwrap().push(create_time.to_string());
        self.abort_on_duplicate
    }

    async fn on_existing_document(&self, path: &Path) -> bool {
        self.documents.lock().unwrap().push(path.to_path_buf());
        self.truncate_existing
    }
}

#[derive(Default)]
struct RecordingProgress {
    updates: Mutex<Vec<(Category, u64)>>,
    errors: Mutex<Vec<String>>,
    outcomes: Mutex<Vec<RunOutcome>>,
}

impl ProgressSink for RecordingProgress {
    fn progress(&self, category: Category, count: u64) {
        self.updates.lock().unwrap().push((category, count));
    }

    fn log(&self, severity: Severity, message: &str) {
        if severity == Severity::Error {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn finished(&self, outcome: &RunOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

fn talk(id: u64, create_time: &str) -> Value {
    json!({
        "topic_id": id,
        "type": "talk",
        "create_time": create_time,
        "talk": {"owner": {"name": "alice"}, "text": format!("topic number {}", id)}
    })
}

/// 45 topics spanning December 2023 to February 2024, 15 per month
fn three_month_history() -> Vec<Value> {
    let mut topics = Vec::new();
    let mut id = 1;

    for day in 1..=15 {
        topics.push(talk(id, &format!("2023-12-{:02}T12:00:00.000+0800", day)));
        id += 1;
    }

    // both window edges are inclusive
    topics.push(talk(id, "2024-01-01T00:00:00.000+0800"));
    id += 1;
    for day in 2..=14 {
        topics.push(talk(id, &format!("2024-01-{:02}T08:30:00.250+0800", day)));
        id += 1;
    }
    topics.push(talk(id, "2024-01-31T23:59:59.999+0800"));
    id += 1;

    for day in 1..=15 {
        topics.push(talk(id, &format!("2024-02-{:02}T00:00:00.000+0800", day)));
        id += 1;
    }

    topics
}

fn crawl_config(output: &Path, start: &str, end: &str) -> CrawlConfig {
    CrawlSection {
        group: GROUP.to_string(),
        cookie: "zsxq_access_token=test".to_string(),
        start: start.to_string(),
        end: end.to_string(),
        media: false,
        attachments: false,
        output: output.display().to_string(),
    }
    .resolve()
    .expect("test config resolves")
}

fn test_settings(server: &MockServer) -> CrawlerSettings {
    CrawlerSettings {
        api_base: format!("{}/", server.uri()),
        page_size: 10,
        poll_interval_ms: 10,
        retry_delay_ms: 20,
        failure_delay_ms: 20,
        request_timeout_secs: 5,
        media_workers: 2,
        download_attempts: 2,
    }
}

async fn mount_history(server: &MockServer, responder: impl Respond + 'static) {
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/topics", GROUP)))
        .respond_with(responder)
        .mount(server)
        .await;
}

async fn run(crawler: Crawler) -> RunOutcome {
    tokio::time::timeout(Duration::from_secs(30), crawler.run())
        .await
        .expect("harvest should finish")
}

fn document_names(output: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(output.join("topics"))
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn headings(document: &str) -> Vec<&str> {
    document
        .lines()
        .filter(|line| line.starts_with("## "))
        .collect()
}

#[tokio::test]
async fn test_january_window_over_three_months() {
    let server = MockServer::start().await;
    mount_history(&server, FakeHistory::new(three_month_history())).await;

    let dir = TempDir::new().unwrap();
    let progress = Arc::new(RecordingProgress::default());
    let crawler = Crawler::new(
        crawl_config(dir.path(), "2024-01-01", "2024-01-31"),
        test_settings(&server),
    )
    .with_progress(progress.clone());

    let outcome = run(crawler).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 15);
    assert_eq!(outcome.counters.media, 0);
    assert_eq!(outcome.message, "finished: 15 records, 0 media, 0 attachments");

    assert_eq!(document_names(dir.path()), vec!["2024-01.md"]);
    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    let headings = headings(&document);
    assert_eq!(headings.len(), 15);
    assert_eq!(
        headings.first().copied(),
        Some("## 2024-01-31T23:59:59.999+0800-alice-talk")
    );
    assert_eq!(
        headings.last().copied(),
        Some("## 2024-01-01T00:00:00.000+0800-alice-talk")
    );

    // newest first, strictly descending
    let times: Vec<&str> = headings.iter().map(|h| &h[3..31]).collect();
    assert!(times.windows(2).all(|pair| pair[0] > pair[1]));

    let updates = progress.updates.lock().unwrap();
    assert_eq!(updates.len(), 15);
    assert_eq!(updates.last(), Some(&(Category::Records, 15)));
    assert_eq!(progress.outcomes.lock().unwrap().as_slice(), &[outcome]);
}

#[tokio::test]
async fn test_unbounded_window_consumes_full_history() {
    let server = MockServer::start().await;
    mount_history(&server, FakeHistory::new(three_month_history())).await;

    let dir = TempDir::new().unwrap();
    let outcome = run(Crawler::new(
        crawl_config(dir.path(), "", ""),
        test_settings(&server),
    ))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 45);
    assert_eq!(
        document_names(dir.path()),
        vec!["2023-12.md", "2024-01.md", "2024-02.md"]
    );
}

#[tokio::test]
async fn test_rerun_produces_identical_documents() {
    let server = MockServer::start().await;
    mount_history(&server, FakeHistory::new(three_month_history())).await;

    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    for dir in [&first, &second] {
        let outcome = run(Crawler::new(
            crawl_config(dir.path(), "2023-12-10", "2024-02-05"),
            test_settings(&server),
        ))
        .await;
        assert!(outcome.success, "{}", outcome.message);
    }

    let names = document_names(first.path());
    assert_eq!(names, document_names(second.path()));
    assert_eq!(names.len(), 3);
    for name in names {
        let a = std::fs::read(first.path().join("topics").join(&name)).unwrap();
        let b = std::fs::read(second.path().join("topics").join(&name)).unwrap();
        assert_eq!(a, b, "{} differs between runs", name);
    }
}

#[tokio::test]
async fn test_duplicate_skipped_after_one_decision() {
    let server = MockServer::start().await;
    mount_history(
        &server,
        FakeHistory::new(vec![
            talk(1, "2024-01-20T10:00:00.300+0800"),
            talk(2, "2024-01-20T10:00:00.200+0800"),
            talk(3, "2024-01-20T10:00:00.200+0800"),
            talk(4, "2024-01-20T10:00:00.100+0800"),
        ]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let resolver = Arc::new(RecordingResolver::default());
    let outcome = run(Crawler::new(crawl_config(dir.path(), "", ""), test_settings(&server))
        .with_resolver(resolver.clone()))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(
        resolver.duplicates.lock().unwrap().as_slice(),
        &["2024-01-20T10:00:00.200+0800".to_string()]
    );
    assert_eq!(outcome.counters.records, 3);

    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    assert!(document.contains("2024-01-20T10:00:00.100+0800"));
}

#[tokio::test]
async fn test_duplicate_abort_ends_walk_successfully() {
    let server = MockServer::start().await;
    mount_history(
        &server,
        FakeHistory::new(vec![
            talk(1, "2024-01-20T10:00:00.300+0800"),
            talk(2, "2024-01-20T10:00:00.200+0800"),
            talk(3, "2024-01-20T10:00:00.200+0800"),
            talk(4, "2024-01-20T10:00:00.100+0800"),
        ]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let resolver = Arc::new(RecordingResolver {
        abort_on_duplicate: true,
        ..Default::default()
    });
    let outcome = run(Crawler::new(crawl_config(dir.path(), "", ""), test_settings(&server))
        .with_resolver(resolver.clone()))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 2);
    assert_eq!(resolver.duplicates.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_existing_document_prompted_once_and_truncated() {
    let server = MockServer::start().await;
    mount_history(&server, FakeHistory::new(three_month_history())).await;

    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("topics")).unwrap();
    std::fs::write(dir.path().join("topics/2024-01.md"), "previous run\n").unwrap();

    let resolver = Arc::new(RecordingResolver {
        truncate_existing: true,
        ..Default::default()
    });
    let outcome = run(Crawler::new(
        crawl_config(dir.path(), "2024-01-01", "2024-02-15"),
        test_settings(&server),
    )
    .with_resolver(resolver.clone()))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    // the February document did not exist, so only January is asked about
    assert_eq!(
        resolver.documents.lock().unwrap().as_slice(),
        &[dir.path().join("topics/2024-01.md")]
    );

    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    assert!(!document.contains("previous run"));
    assert_eq!(headings(&document).len(), 15);
}

#[tokio::test]
async fn test_existing_document_appended() {
    let server = MockServer::start().await;
    mount_history(&server, FakeHistory::new(three_month_history())).await;

    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("topics")).unwrap();
    std::fs::write(dir.path().join("topics/2024-01.md"), "previous run\n").unwrap();

    let resolver = Arc::new(RecordingResolver::default());
    let outcome = run(Crawler::new(
        crawl_config(dir.path(), "2024-01-01", "2024-01-31"),
        test_settings(&server),
    )
    .with_resolver(resolver.clone()))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(resolver.documents.lock().unwrap().len(), 1);

    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    assert!(document.starts_with("previous run\n## 2024-01-31T23:59:59.999+0800"));
    assert_eq!(headings(&document).len(), 15);
}

#[tokio::test]
async fn test_media_and_attachments_downloaded() {
    let server = MockServer::start().await;
    let uri = server.uri();

    let topic = json!({
        "topic_id": 100,
        "type": "talk",
        "create_time": "2024-01-10T09:00:00.000+0800",
        "talk": {
            "owner": {"name": "bob"},
            "text": "with media",
            "images": [{
                "image_id": 1,
                "type": "png",
                "original": {"url": format!("{}/img/1/original", uri)},
                "large": {"url": format!("{}/img/1/large", uri)}
            }],
            "files": [{"file_id": 9, "name": "notes.pdf"}]
        }
    });
    let question = json!({
        "topic_id": 101,
        "type": "q&a",
        "create_time": "2024-01-09T09:00:00.000+0800",
        "question": {"owner": {"name": "carol"}, "text": "how?"},
        "answer": {
            "owner": {"name": "bob"},
            "text": "like this",
            "images": [{"image_id": 2, "thumbnail": {"url": format!("{}/img/2/thumb", uri)}}]
        }
    });
    mount_history(&server, FakeHistory::new(vec![topic, question])).await;

    // the original rendition is broken, the large one works
    Mock::given(method("GET"))
        .and(path("/img/1/original"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/1/large"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"large-png".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/2/thumb"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb-jpg".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/9/download_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "succeeded": true,
            "resp_data": {"download_url": format!("{}/dl/9", uri)}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/9"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = crawl_config(dir.path(), "", "");
    config.media = true;
    config.attachments = true;

    let outcome = run(Crawler::new(config, test_settings(&server))).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 2);
    assert_eq!(outcome.counters.media, 2);
    assert_eq!(outcome.counters.attachments, 1);

    assert_eq!(std::fs::read(dir.path().join("images/1.png")).unwrap(), b"large-png");
    assert_eq!(std::fs::read(dir.path().join("images/2.jpg")).unwrap(), b"thumb-jpg");
    assert_eq!(
        std::fs::read(dir.path().join("files/9/notes.pdf")).unwrap(),
        b"%PDF-1.4"
    );

    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    assert!(document.contains("![image](../images/1.png)"));
    assert!(document.contains("[notes.pdf](../files/9/notes.pdf)"));
}

#[tokio::test]
async fn test_rejected_attachment_is_abandoned() {
    let server = MockServer::start().await;
    mount_history(
        &server,
        FakeHistory::new(vec![json!({
            "topic_id": 1,
            "type": "talk",
            "create_time": "2024-01-10T09:00:00.000+0800",
            "talk": {"text": "file", "files": [{"file_id": 5, "name": "gone.zip"}]}
        })]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/5/download_url"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"succeeded": false, "code": 404})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = crawl_config(dir.path(), "", "");
    config.attachments = true;
    let progress = Arc::new(RecordingProgress::default());

    let outcome = run(Crawler::new(config, test_settings(&server)).with_progress(progress.clone()))
        .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 1);
    assert_eq!(outcome.counters.attachments, 0);
    assert!(!dir.path().join("files/5/gone.zip").exists());
    assert!(progress
        .errors
        .lock()
        .unwrap()
        .iter()
        .any(|message| message.contains("file 5")));
}

#[tokio::test]
async fn test_failure_envelope_is_retried() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    mount_history(
        &server,
        FlakyHistory {
            history: FakeHistory::new(three_month_history()),
            failures: 3,
            failure_body: r#"{"succeeded": false, "code": 1059}"#.to_string(),
            calls: calls.clone(),
        },
    )
    .await;

    let dir = TempDir::new().unwrap();
    let outcome = run(Crawler::new(
        crawl_config(dir.path(), "2024-01-01", "2024-01-31"),
        test_settings(&server),
    ))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 15);
    assert!(calls.load(Ordering::SeqCst) > 3);
}

#[tokio::test]
async fn test_malformed_page_is_retried() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    mount_history(
        &server,
        FlakyHistory {
            history: FakeHistory::new(three_month_history()),
            failures: 2,
            failure_body: "<html>please log in</html>".to_string(),
            calls: calls.clone(),
        },
    )
    .await;

    let dir = TempDir::new().unwrap();
    let outcome = run(Crawler::new(
        crawl_config(dir.path(), "2024-02-01", ""),
        test_settings(&server),
    ))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.counters.records, 15);
    assert_eq!(document_names(dir.path()), vec!["2024-02.md"]);
}

#[tokio::test]
async fn test_unreadable_timestamp_writes_nothing_for_that_page() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    mount_history(
        &server,
        FlakyHistory {
            history: FakeHistory::new(vec![talk(1, "2024-01-20T10:00:00.000+0800")]),
            failures: 1,
            failure_body: json!({"succeeded": true, "resp_data": {"topics": [
                talk(1, "2024-01-20T10:00:00.000+0800"),
                talk(2, "2024-01-19 10:00:00")
            ]}})
            .to_string(),
            calls: calls.clone(),
        },
    )
    .await;

    let dir = TempDir::new().unwrap();
    let outcome = run(Crawler::new(crawl_config(dir.path(), "", ""), test_settings(&server))).await;

    assert!(outcome.success, "{}", outcome.message);
    // the unreadable page is retried as a whole, so topic 1 is written exactly once
    assert_eq!(outcome.counters.records, 1);
    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    assert_eq!(headings(&document).len(), 1);
}

#[tokio::test]
async fn test_unreadable_timestamp_mid_page_does_not_end_walk() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    mount_history(
        &server,
        FlakyHistory {
            history: FakeHistory::new(vec![
                talk(1, "2024-01-20T10:00:00.000+0800"),
                talk(2, "2024-01-19T10:00:00.000+0800"),
                talk(3, "2024-01-18T10:00:00.000+0800"),
            ]),
            failures: 1,
            // topic 2 without milliseconds sorts below the start bound
            failure_body: json!({"succeeded": true, "resp_data": {"topics": [
                talk(1, "2024-01-20T10:00:00.000+0800"),
                talk(2, "2024-01-19T10:00:00+0800"),
                talk(3, "2024-01-18T10:00:00.000+0800")
            ]}})
            .to_string(),
            calls: calls.clone(),
        },
    )
    .await;

    let dir = TempDir::new().unwrap();
    let outcome = run(Crawler::new(
        crawl_config(dir.path(), "2024-01-19T10:00:00", ""),
        test_settings(&server),
    ))
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(outcome.counters.records, 2);
    let document = std::fs::read_to_string(dir.path().join("topics/2024-01.md")).unwrap();
    assert_eq!(headings(&document).len(), 2);
}

#[tokio::test]
async fn test_cancellation_stops_retrying_walk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{}/topics", GROUP)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"succeeded": false, "code": 1059}"#)
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&server);
    // long enough that only cancellation can end the backoff
    settings.failure_delay_ms = 60_000;
    let mut config = crawl_config(dir.path(), "", "");
    config.media = true;
    config.attachments = true;

    let crawler = Crawler::new(config, settings);
    let cancel = crawler.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), crawler.run())
        .await
        .expect("cancelled run must not deadlock");

    assert!(!outcome.success);
    assert_eq!(outcome.message, "stopped");
    assert_eq!(outcome.counters.records, 0);
}
