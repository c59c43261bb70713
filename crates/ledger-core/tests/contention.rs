use ledger_core::{Error, Ledger, LedgerConfig, LedgerDb, VersionedFileStore};
use ledger_local_db::rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn file_config(path: &Path) -> LedgerConfig {
    LedgerConfig {
        database_path: Some(path.to_path_buf()),
        ..LedgerConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bootstrap_on_two_handles() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir.path().join("ledger.db"));
    let first = Ledger::open(config.clone()).unwrap();
    let second = Ledger::open(config).unwrap();

    let mut handles = Vec::new();
    for i in 0..200 {
        let ledger = if i % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move {
            let n = i / 4;
            let project = ledger
                .bootstrap()
                .ensure(&format!("t{}", n), &format!("p{}", n))
                .await;
            (n, project)
        }));
    }

    for handle in handles {
        let (n, project) = handle.await.unwrap();
        let project = project.unwrap();
        assert_eq!(project.id, format!("p{}", n));
        assert_eq!(project.tenant_id, format!("t{}", n));
    }
    for n in 0..50 {
        let projects = first.projects().list_projects(&format!("t{}", n)).await.unwrap();
        assert_eq!(projects.len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tracking_on_two_handles_keeps_every_write() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir.path().join("ledger.db"));
    let first = Ledger::open(config.clone()).unwrap();
    let second = Ledger::open(config).unwrap();

    let mut handles = Vec::new();
    for i in 0..40 {
        let ledger = if i % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move {
            let content = format!("y={}", i);
            ledger
                .on_file_written("tenant", "project", "/shared.py", &content, "write_file")
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let versions = first.files().list_versions("project", "/shared.py").await.unwrap();
    let numbers: Vec<i64> = versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, (1..=40).collect::<Vec<i64>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_appends_retry_when_the_writer_lock_is_taken() {
    let dir = TempDir::new().unwrap();
    let config = LedgerConfig {
        busy_timeout_ms: 0,
        max_append_attempts: 500,
        retry_backoff_ms: 1,
        ..file_config(&dir.path().join("ledger.db"))
    };
    let first = LedgerDb::open(config.clone()).unwrap();
    let second = LedgerDb::open(config).unwrap();
    Ledger::new(first.clone()).bootstrap().ensure("t", "p").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let db = if i % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move {
            VersionedFileStore::new(db)
                .append_version("p", "/contended.txt", &format!("content {}", i), "writer")
                .await
                .unwrap()
                .version
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        assert!(seen.insert(handle.await.unwrap()));
    }
    assert_eq!(seen, (1..=20).collect::<HashSet<i64>>());
}

#[tokio::test]
async fn test_exhausted_retries_report_version_conflict() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let config = LedgerConfig {
        busy_timeout_ms: 0,
        max_append_attempts: 3,
        retry_backoff_ms: 1,
        ..file_config(&path)
    };
    let ledger = Ledger::open(config).unwrap();
    ledger.bootstrap().ensure("t", "p").await.unwrap();

    let holder = Connection::open(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE").unwrap();

    let err = ledger
        .files()
        .append_version("p", "/a.txt", "blocked", "t")
        .await
        .unwrap_err();
    match err {
        Error::VersionConflict {
            project_id,
            file_path,
            attempts,
        } => {
            assert_eq!(project_id, "p");
            assert_eq!(file_path, "/a.txt");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected version conflict, got {}", other),
    }

    holder.execute_batch("COMMIT").unwrap();
    let record = ledger
        .files()
        .append_version("p", "/a.txt", "unblocked", "t")
        .await
        .unwrap();
    assert_eq!(record.version, 1);
}

#[tokio::test]
async fn test_append_to_unknown_project_fails_without_retrying() {
    let config = LedgerConfig {
        retry_backoff_ms: 10_000,
        ..LedgerConfig::default()
    };
    let files = VersionedFileStore::new(LedgerDb::open_in_memory_with(config).unwrap());

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        files.append_version("no-such-project", "/a", "x", "t"),
    )
    .await
    .expect("append should not back off");

    match result {
        Err(Error::ProjectNotFound { project_id }) => assert_eq!(project_id, "no-such-project"),
        other => panic!("expected project not found, got {:?}", other.map(|r| r.version)),
    }
}
