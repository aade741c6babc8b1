//! Integration tests for the download orchestrator over real HTTP.
//!
//! Each test serves items from a wiremock server and writes into a
//! temporary destination root.

mod support;

use std::path::PathBuf;
use std::time::Duration;

use multporn_core::download::{
    CollectingReporter, DownloadEngine, EngineError, EngineOptions, ItemOutcome, SilentReporter,
};
use multporn_core::{Collection, ContentKind};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{fast_client, serve_truncated_once, visible_files};

fn page_urls(server: &MockServer, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{}/pages/{i}.jpg", server.uri()))
        .collect()
}

/// Mounts `/pages/{i}.jpg` for every index, each expected `hits` times.
async fn mount_pages(server: &MockServer, count: usize, hits: u64) {
    for i in 0..count {
        Mock::given(method("GET"))
            .and(path(format!("/pages/{i}.jpg")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(format!("page {i}").into_bytes()),
            )
            .expect(hits)
            .mount(server)
            .await;
    }
}

fn engine() -> DownloadEngine {
    DownloadEngine::new(EngineOptions::default()).unwrap()
}

#[tokio::test]
async fn test_twelve_page_album_into_empty_directory() {
    let server = MockServer::start().await;
    mount_pages(&server, 12, 1).await;
    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Between Friends", ContentKind::Album, page_urls(&server, 12));
    let reporter = CollectingReporter::new();

    let report = engine()
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.fetched(), 12);
    let dir = temp.path().join("Between Friends");
    let expected: Vec<String> = (0..12).map(|i| format!("Between Friends_{i:02}.jpg")).collect();
    assert_eq!(visible_files(&dir), expected);
    assert_eq!(
        std::fs::read(dir.join("Between Friends_07.jpg")).unwrap(),
        b"page 7"
    );

    let messages = reporter.messages();
    assert_eq!(messages.first().unwrap(), "page 1/12 done");
    assert_eq!(messages.last().unwrap(), "12 new pages found");
}

#[tokio::test]
async fn test_second_run_fetches_nothing_and_returns_same_paths() {
    let server = MockServer::start().await;
    // Each page is requested by the first run only.
    mount_pages(&server, 5, 1).await;
    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Repeat", ContentKind::Album, page_urls(&server, 5));
    let client = fast_client(0);
    let cancel = CancellationToken::new();

    let first = engine()
        .download(&collection, &client, temp.path(), &SilentReporter, &cancel)
        .await
        .unwrap();
    let reporter = CollectingReporter::new();
    let second = engine()
        .download(&collection, &client, temp.path(), &reporter, &cancel)
        .await
        .unwrap();

    assert_eq!(second.fetched(), 0);
    assert_eq!(second.present(), 5);
    assert_eq!(
        first.paths().collect::<Vec<_>>(),
        second.paths().collect::<Vec<_>>()
    );
    assert_eq!(
        reporter.messages(),
        ["pages 1 through 5 out of 5 exist, skipping", "no updates"]
    );
}

#[tokio::test]
async fn test_resume_fetches_only_missing_tail() {
    let server = MockServer::start().await;
    for i in 0..5 {
        Mock::given(method("GET"))
            .and(path(format!("/pages/{i}.jpg")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(b"jpg".to_vec()),
            )
            .expect(if i < 3 { 0 } else { 1 })
            .mount(&server)
            .await;
    }
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("Resume");
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..3 {
        std::fs::write(dir.join(format!("Resume_{i}.png")), b"old").unwrap();
    }

    let collection = Collection::new("Resume", ContentKind::Album, page_urls(&server, 5));
    let reporter = CollectingReporter::new();
    let report = engine()
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.present(), 3);
    assert_eq!(report.fetched(), 2);
    assert_eq!(
        reporter.messages(),
        [
            "pages 1 through 3 out of 5 exist, skipping",
            "page 4/5 done",
            "page 5/5 done",
            "2 new pages found"
        ]
    );
    // Existing files keep their extension and content.
    assert_eq!(std::fs::read(dir.join("Resume_0.png")).unwrap(), b"old");
}

#[tokio::test]
async fn test_failed_page_is_isolated() {
    let server = MockServer::start().await;
    for i in [0, 1, 3, 4] {
        Mock::given(method("GET"))
            .and(path(format!("/pages/{i}.jpg")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(b"jpg".to_vec()),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/pages/2.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Holes", ContentKind::Album, page_urls(&server, 5));
    let reporter = CollectingReporter::new();
    let report = engine()
        .download(
            &collection,
            &fast_client(3),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes().len(), 5);
    assert_eq!(report.fetched(), 4);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        &report.outcomes()[2],
        ItemOutcome::Failed { index: 2, reason, .. } if reason.contains("404")
    ));
    assert_eq!(
        visible_files(&temp.path().join("Holes")),
        [
            "Holes_0.jpg",
            "Holes_1.jpg",
            "Holes_2_SKIPPED",
            "Holes_3.jpg",
            "Holes_4.jpg"
        ]
    );
    assert!(reporter.messages()[2].starts_with("page 3/5 skipped because HTTP 404"));
}

#[tokio::test]
async fn test_forcelisted_status_retried_within_a_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pages/0.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_pages(&server, 1, 1).await;

    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Flaky", ContentKind::Album, page_urls(&server, 1));
    let report = engine()
        .download(
            &collection,
            &fast_client(5),
            temp.path(),
            &SilentReporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.fetched(), 1);
    assert_eq!(report.failed(), 0);
}

#[tokio::test]
async fn test_outcomes_stay_ordered_under_concurrency() {
    let server = MockServer::start().await;
    let count = 8;
    for i in 0..count {
        // Earlier pages answer slower so completions arrive out of order.
        let delay = Duration::from_millis(20 * u64::try_from(count - i).unwrap());
        Mock::given(method("GET"))
            .and(path(format!("/pages/{i}.jpg")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(b"jpg".to_vec())
                    .set_delay(delay),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Parallel", ContentKind::Album, page_urls(&server, count));
    let engine = DownloadEngine::new(EngineOptions {
        concurrency: 4,
        ..EngineOptions::default()
    })
    .unwrap();
    let reporter = CollectingReporter::new();
    let report = engine
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let indices: Vec<usize> = report.outcomes().iter().map(ItemOutcome::index).collect();
    assert_eq!(indices, (0..count).collect::<Vec<_>>());
    let expected: Vec<String> = (1..=count)
        .map(|page| format!("page {page}/{count} done"))
        .chain(std::iter::once(format!("{count} new pages found")))
        .collect();
    assert_eq!(reporter.messages(), expected);
}

#[tokio::test]
async fn test_extension_follows_content_type() {
    let server = MockServer::start().await;
    support::mount_file(&server, "/pages/0.jpg", "image/png", b"png").await;
    support::mount_file(&server, "/pages/1.jpg", "image/jpeg", b"jpg").await;

    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Mixed", ContentKind::Album, page_urls(&server, 2));
    let report = engine()
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &SilentReporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let names: Vec<String> = report
        .paths()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["Mixed_0.png", "Mixed_1.jpg"]);
}

#[tokio::test]
async fn test_video_is_saved_under_bare_name() {
    let server = MockServer::start().await;
    support::mount_file(&server, "/videos/clip.mp4", "video/mp4", b"mp4 bytes").await;

    let temp = TempDir::new().unwrap();
    let collection = Collection::new(
        "Some Clip",
        ContentKind::Video,
        [format!("{}/videos/clip.mp4", server.uri())],
    );
    let reporter = CollectingReporter::new();
    let report = engine()
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let expected = temp.path().join("Some Clip").join("Some Clip.mp4");
    assert_eq!(report.paths().collect::<Vec<_>>(), [expected.as_path()]);
    assert_eq!(std::fs::read(&expected).unwrap(), b"mp4 bytes");
    assert_eq!(reporter.messages(), ["page 1/1 done", "1 new pages found"]);
}

#[tokio::test]
async fn test_video_with_existing_marker_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("Some Clip");
    std::fs::create_dir_all(&dir).unwrap();
    let marker: PathBuf = dir.join("Some Clip_SKIPPED");
    std::fs::write(&marker, b"").unwrap();

    let collection = Collection::new(
        "Some Clip",
        ContentKind::Video,
        [format!("{}/videos/clip.mp4", server.uri())],
    );
    let reporter = CollectingReporter::new();
    let report = engine()
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.present(), 1);
    assert_eq!(report.paths().collect::<Vec<_>>(), [marker.as_path()]);
    assert_eq!(reporter.messages(), ["no updates"]);
}

#[tokio::test]
async fn test_empty_collection_reports_no_updates() {
    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Nothing", ContentKind::Album, Vec::<String>::new());
    let reporter = CollectingReporter::new();

    let report = engine()
        .download(
            &collection,
            &fast_client(0),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.exists());
    assert_eq!(report.paths().count(), 0);
    assert_eq!(reporter.messages(), ["no updates"]);
}

#[tokio::test]
async fn test_truncated_body_leaves_marker() {
    let url = serve_truncated_once("image/jpeg", 100, b"abc").await;
    let temp = TempDir::new().unwrap();
    let collection = Collection::new("Cut Short", ContentKind::Album, vec![url]);
    let reporter = CollectingReporter::new();

    let report = engine()
        .download(
            &collection,
            &fast_client(3),
            temp.path(),
            &reporter,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let dir = temp.path().join("Cut Short");
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        &report.outcomes()[0],
        ItemOutcome::Failed { index: 0, path, reason }
            if path == &dir.join("Cut Short_0_SKIPPED") && reason.contains("expected 100 bytes")
    ));
    assert_eq!(visible_files(&dir), ["Cut Short_0_SKIPPED"]);
    assert_eq!(std::fs::metadata(dir.join("Cut Short_0_SKIPPED")).unwrap().len(), 0);
    assert_eq!(reporter.messages().last().unwrap(), "no updates");
}

#[tokio::test]
async fn test_unwritable_root_aborts_run() {
    let server = MockServer::start().await;
    mount_pages(&server, 2, 0).await;
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("not-a-directory");
    std::fs::write(&root, b"file").unwrap();
    let collection = Collection::new("Blocked", ContentKind::Album, page_urls(&server, 2));

    let result = engine()
        .download(
            &collection,
            &fast_client(0),
            &root,
            &SilentReporter,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(EngineError::Io { .. })));
    assert!(root.is_file());
}
