use std::collections::BTreeSet;
use std::time::Duration;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use jackal::config::EngineConfig;
use jackal::events::Subscription;
use jackal::models::ResultRecord;
use jackal::pipeline::config::DirScanConfig;
use jackal::pipeline::{JobCategory, JobConfig, JobStatus};
use jackal::Engine;
use tokio::net::TcpListener;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn wordlist(dir: &tempfile::TempDir, lines: &[&str]) -> String {
    let path = dir.path().join("dirs.txt");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path.to_string_lossy().into_owned()
}

fn scan(target: String, dictionary: String, exclude_404: bool, recursion_depth: u32) -> JobConfig {
    JobConfig::DirScan(DirScanConfig {
        target,
        extensions: vec!["php".into()],
        concurrency: Some(4),
        timeout_ms: Some(2_000),
        exclude_404,
        follow_redirects: false,
        dictionary: Some(dictionary),
        recursion_depth,
    })
}

async fn urls_until_complete(events: &mut Subscription) -> (BTreeSet<String>, JobStatus) {
    let mut urls = BTreeSet::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(20), events.next())
            .await
            .expect("job did not complete in time")
            .expect("bus closed");
        if let Some(ResultRecord::Path { url, .. }) = event.record() {
            urls.insert(url.clone());
        }
        if let jackal::events::EventPayload::Complete { outcome } = event.payload {
            return (urls, outcome.status);
        }
    }
}

#[tokio::test]
async fn test_catch_all_server_yields_nothing() {
    let base = serve(Router::new().fallback(|| async { "<html><title>Home</title>welcome</html>" })).await;
    let dir = tempfile::tempdir().unwrap();

    let engine = Engine::new(EngineConfig::default()).unwrap();
    let mut events = engine.bus.subscribe(JobCategory::DirScan);
    engine
        .controller
        .start(scan(base, wordlist(&dir, &["admin", "login", "index.%EXT%", "backup"]), true, 0))
        .await
        .unwrap();

    let (urls, status) = urls_until_complete(&mut events).await;
    assert!(urls.is_empty(), "unexpected findings {:?}", urls);
    assert_eq!(status, JobStatus::Completed);
}

#[tokio::test]
async fn test_recurses_into_forbidden_directory() {
    let app = Router::new()
        .route("/admin", get(|| async { StatusCode::FORBIDDEN }))
        .route("/admin/config.php", get(|| async { "db_password=..." }));
    let base = serve(app).await;
    let dir = tempfile::tempdir().unwrap();

    let engine = Engine::new(EngineConfig::default()).unwrap();
    let mut events = engine.bus.subscribe(JobCategory::DirScan);
    engine
        .controller
        .start(scan(base.clone(), wordlist(&dir, &["admin", "config.%EXT%", "missing"]), true, 1))
        .await
        .unwrap();

    let (urls, _) = urls_until_complete(&mut events).await;
    let expected: BTreeSet<String> =
        [format!("{}/admin", base), format!("{}/admin/config.php", base)].into_iter().collect();
    assert_eq!(urls, expected);
}

#[tokio::test]
async fn test_keeping_404_reports_every_path() {
    let base = serve(Router::new()).await;
    let dir = tempfile::tempdir().unwrap();

    let engine = Engine::new(EngineConfig::default()).unwrap();
    let mut events = engine.bus.subscribe(JobCategory::DirScan);
    engine
        .controller
        .start(scan(base, wordlist(&dir, &["a", "b"]), false, 0))
        .await
        .unwrap();

    let (urls, _) = urls_until_complete(&mut events).await;
    assert_eq!(urls.len(), 2);
}
