use async_trait::async_trait;
use ledger_core::{
    Ledger, LedgerDb, LocalDirWriter, SandboxState, SandboxWriter, TrackedWriter,
};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tempfile::TempDir;

/// Records every write; fails for paths listed in `fail`.
#[derive(Default)]
struct RecordingWriter {
    writes: Mutex<Vec<(String, String)>>,
    fail: Vec<String>,
}

impl RecordingWriter {
    fn failing_on(paths: &[&str]) -> Self {
        Self {
            writes: Mutex::default(),
            fail: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxWriter for RecordingWriter {
    async fn write(&self, path: &str, content: &str) -> ledger_core::Result<()> {
        if self.fail.iter().any(|p| p == path) {
            return Err(ledger_core::Error::sandbox(path, "sandbox rejected write"));
        }
        self.writes
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_string()));
        Ok(())
    }
}

fn ledger() -> Ledger {
    Ledger::new(LedgerDb::open_in_memory().unwrap())
}

#[tokio::test]
async fn test_write_then_restore_latest() {
    let ledger = ledger();
    assert!(ledger.on_file_written("t1", "p1", "/a.py", "x=1", "write_file").await);
    assert!(ledger.on_file_written("t1", "p1", "/a.py", "x=2", "write_file").await);

    let tenant = ledger.projects().get_tenant("t1").await.unwrap().unwrap();
    assert_eq!(tenant.contact, "t1@system.local");
    assert_eq!(tenant.handle, "t1");
    let project = ledger.projects().get_project("p1").await.unwrap().unwrap();
    assert_eq!(project.tenant_id, "t1");
    assert_eq!(project.name, "Project p1");

    let writer = RecordingWriter::default();
    let restored = ledger.restore_project("p1", &writer).await.unwrap();
    assert_eq!(restored, BTreeMap::from([("/a.py".to_string(), 2)]));
    assert_eq!(writer.writes(), vec![("/a.py".to_string(), "x=2".to_string())]);

    let project = ledger.projects().get_project("p1").await.unwrap().unwrap();
    assert!(project.last_accessed.is_some());
}

#[tokio::test]
async fn test_restore_skips_failing_files() {
    let ledger = ledger();
    for path in ["/a", "/b", "/c"] {
        ledger.on_file_written("t", "p", path, path, "t").await;
    }

    let writer = RecordingWriter::failing_on(&["/b"]);
    let restored = ledger.restore_project("p", &writer).await.unwrap();
    assert_eq!(
        restored,
        BTreeMap::from([("/a".to_string(), 1), ("/c".to_string(), 1)])
    );
}

#[tokio::test]
async fn test_restore_of_unknown_project_is_empty() {
    let ledger = ledger();
    let writer = RecordingWriter::default();
    assert!(ledger.restore_project("ghost", &writer).await.unwrap().is_empty());
    assert!(writer.writes().is_empty());
}

#[tokio::test]
async fn test_restore_into_local_directory() {
    let ledger = ledger();
    ledger.on_file_written("t", "p", "/src/main.py", "print('hi')\n", "t").await;
    ledger.on_file_written("t", "p", "/README.md", "# demo\n", "t").await;

    let dir = TempDir::new().unwrap();
    let writer = LocalDirWriter::new(dir.path());
    let restored = ledger.restore_project("p", &writer).await.unwrap();
    assert_eq!(restored.len(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/main.py")).unwrap(),
        "print('hi')\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("README.md")).unwrap(),
        "# demo\n"
    );
}

#[tokio::test]
async fn test_tracking_failure_is_reported_not_raised() {
    let db = LedgerDb::open_in_memory().unwrap();
    let ledger = Ledger::new(db.clone());
    ledger.bootstrap().ensure("t", "p").await.unwrap();
    db.database()
        .connection()
        .lock()
        .unwrap()
        .execute_batch("DROP TABLE file_versions")
        .unwrap();

    assert!(!ledger.on_file_written("t", "p", "/a", "x", "t").await);

    // The sandbox write still succeeds through a tracked writer
    let tracked = TrackedWriter::new(
        RecordingWriter::default(),
        ledger.tracker().clone(),
        "t",
        "p",
        "write_file",
    );
    tracked.write("/a", "x").await.unwrap();
    assert_eq!(tracked.inner().writes().len(), 1);
}

#[tokio::test]
async fn test_tracked_writer_records_successful_writes_only() {
    let ledger = ledger();
    let tracked = TrackedWriter::new(
        RecordingWriter::failing_on(&["/blocked"]),
        ledger.tracker().clone(),
        "t",
        "p",
        "write_file",
    );

    tracked.write("/ok", "1").await.unwrap();
    tracked.write("/ok", "2").await.unwrap();
    assert!(tracked.write("/blocked", "x").await.is_err());

    let latest = ledger.files().get_latest("p", "/ok").await.unwrap().unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.created_by_tool, "write_file");
    assert!(ledger.files().get_latest("p", "/blocked").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sandbox_state_changes() {
    let ledger = ledger();
    assert!(
        !ledger
            .on_sandbox_state_changed("ghost", Some("sbx"), SandboxState::Running)
            .await
    );
    assert!(ledger.projects().get_project("ghost").await.unwrap().is_none());

    ledger.bootstrap().ensure("t", "p").await.unwrap();
    assert!(
        ledger
            .on_sandbox_state_changed("p", Some("sbx-1"), SandboxState::Running)
            .await
    );
    let project = ledger.projects().get_project("p").await.unwrap().unwrap();
    assert_eq!(project.active_sandbox_id.as_deref(), Some("sbx-1"));
    assert_eq!(project.sandbox_state, SandboxState::Running);

    assert!(
        ledger
            .on_sandbox_state_changed("p", None, SandboxState::Killed)
            .await
    );
    let project = ledger.projects().get_project("p").await.unwrap().unwrap();
    assert_eq!(project.active_sandbox_id, None);
    assert_eq!(project.sandbox_state, SandboxState::Killed);
}

#[tokio::test]
async fn test_project_keeps_original_tenant() {
    let ledger = ledger();
    ledger.bootstrap().ensure("owner", "p").await.unwrap();
    let project = ledger.bootstrap().ensure("intruder", "p").await.unwrap();
    assert_eq!(project.tenant_id, "owner");
    assert!(ledger.projects().get_tenant("intruder").await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_tenant_cascades() {
    let ledger = ledger();
    ledger.on_file_written("t", "p", "/a", "1", "t").await;
    ledger.get_or_create_session("t", "p", Some("run-1")).await.unwrap();
    ledger
        .projects()
        .record_snapshot("p", serde_json::json!({"files": 1}), Some("sbx"), "full")
        .await
        .unwrap();

    assert!(ledger.projects().delete_tenant("t").await.unwrap());
    assert!(ledger.projects().get_project("p").await.unwrap().is_none());
    assert!(ledger.files().list_latest_per_path("p").await.unwrap().is_empty());
    assert!(ledger.sessions().get_session("run-1").await.unwrap().is_none());
    assert!(ledger.projects().list_snapshots("p").await.unwrap().is_empty());
    assert!(!ledger.projects().delete_tenant("t").await.unwrap());
}
