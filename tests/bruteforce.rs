use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use jackal::config::EngineConfig;
use jackal::events::Subscription;
use jackal::models::{CredentialTarget, ResultRecord};
use jackal::pipeline::config::BruteForceConfig;
use jackal::pipeline::{JobCategory, JobConfig, JobStatus};
use jackal::probes::credential::Service;
use jackal::Engine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Minimal FTP login server counting PASS attempts.
async fn fake_ftp(user: &'static str, pass: &'static str, attempts: Arc<AtomicUsize>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let attempts = attempts.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                if write.write_all(b"220 fake ftp\r\n").await.is_err() {
                    return;
                }
                let mut current = String::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply: &[u8] = if let Some(u) = line.strip_prefix("USER ") {
                        current = u.to_string();
                        b"331 password please\r\n"
                    } else if let Some(p) = line.strip_prefix("PASS ") {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        if current == user && p == pass {
                            b"230 welcome\r\n"
                        } else {
                            b"530 denied\r\n"
                        }
                    } else {
                        break;
                    };
                    if write.write_all(reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    port
}

fn dictionary(dir: &tempfile::TempDir, name: &str, lines: &[&str]) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path.to_string_lossy().into_owned()
}

async fn results_until_complete(events: &mut Subscription) -> Vec<ResultRecord> {
    let mut records = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(30), events.next())
            .await
            .expect("job did not complete in time")
            .expect("bus closed");
        if let Some(record) = event.record() {
            records.push(record.clone());
        }
        if event.is_complete() {
            return records;
        }
    }
}

#[tokio::test]
async fn test_stops_target_after_first_valid_pair() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let port = fake_ftp("admin", "letmein", attempts.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let engine = Engine::new(EngineConfig::default()).unwrap();
    let mut events = engine.bus.subscribe(JobCategory::CredentialBruteForce);
    let handle = engine
        .controller
        .start(JobConfig::CredentialBruteForce(BruteForceConfig {
            targets: vec![CredentialTarget { host: "127.0.0.1".into(), port, service: Service::Ftp }],
            concurrency: Some(1),
            timeout_ms: Some(2_000),
            user_dict: Some(dictionary(&dir, "users.txt", &["admin"])),
            pass_dict: Some(dictionary(&dir, "pass.txt", &["a", "b", "letmein", "c"])),
            ..Default::default()
        }))
        .await
        .unwrap();

    let records = results_until_complete(&mut events).await;
    assert_eq!(records.len(), 1);
    match &records[0] {
        ResultRecord::Credential { username, password, port: found, success, .. } => {
            assert_eq!(username, "admin");
            assert_eq!(password, "letmein");
            assert_eq!(*found, port);
            assert!(success);
        }
        other => panic!("unexpected record {:?}", other),
    }
    // The third pair was valid and nothing followed it
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(handle.wait().await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_parallel_workers_report_one_success_per_target() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let port = fake_ftp("admin", "letmein", attempts.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    let engine = Engine::new(EngineConfig::default()).unwrap();
    let mut events = engine.bus.subscribe(JobCategory::CredentialBruteForce);
    engine
        .controller
        .start(JobConfig::CredentialBruteForce(BruteForceConfig {
            targets: vec![CredentialTarget { host: "127.0.0.1".into(), port, service: Service::Ftp }],
            concurrency: Some(4),
            timeout_ms: Some(2_000),
            user_dict: Some(dictionary(&dir, "users.txt", &["admin"])),
            pass_dict: Some(dictionary(&dir, "pass.txt", &["letmein", "x", "y", "z"])),
            ..Default::default()
        }))
        .await
        .unwrap();

    let records = results_until_complete(&mut events).await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_unknown_protocol_is_config_error() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let err = engine
        .controller
        .start(JobConfig::CredentialBruteForce(BruteForceConfig {
            target: Some("127.0.0.1".into()),
            protocols: vec!["gopher".into()],
            ..Default::default()
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, jackal::EngineError::Config(_)));
}
