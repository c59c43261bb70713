//! File write capability against an execution sandbox.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Writes a file into an execution environment.
///
/// This is the only sandbox operation the ledger relies on: a completed write
/// triggers version tracking, and restore replays stored files through it.
#[async_trait]
pub trait SandboxWriter: Send + Sync {
    async fn write(&self, path: &str, content: &str) -> crate::Result<()>;
}

/// Sandbox writer backed by a local directory.
///
/// Sandbox paths are interpreted relative to `root`; a leading `/` is
/// stripped. Paths containing `..` are rejected.
#[derive(Debug, Clone)]
pub struct LocalDirWriter {
    root: PathBuf,
}

impl LocalDirWriter {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a sandbox path onto the local root.
    pub fn resolve(&self, path: &str) -> crate::Result<PathBuf> {
        let mut resolved = self.root.clone();
        let mut pushed = false;
        for component in Path::new(path).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => {
                    resolved.push(part);
                    pushed = true;
                }
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(crate::Error::sandbox(path, "path escapes the restore root"));
                }
            }
        }
        if !pushed {
            return Err(crate::Error::sandbox(path, "path does not name a file"));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl SandboxWriter for LocalDirWriter {
    async fn write(&self, path: &str, content: &str) -> crate::Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| crate::Error::sandbox(path, e.to_string()))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| crate::Error::sandbox(path, e.to_string()))?;
        debug!("Wrote {} to {}", path, target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strips_root_and_rejects_escape() {
        let writer = LocalDirWriter::new("/tmp/restore");
        assert_eq!(
            writer.resolve("/src/main.py").unwrap(),
            PathBuf::from("/tmp/restore/src/main.py")
        );
        assert_eq!(
            writer.resolve("./a.txt").unwrap(),
            PathBuf::from("/tmp/restore/a.txt")
        );
        assert!(writer.resolve("/../etc/passwd").is_err());
        assert!(writer.resolve("/").is_err());
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let writer = LocalDirWriter::new(dir.path());
        writer.write("/pkg/sub/mod.py", "print(1)\n").await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("pkg/sub/mod.py")).unwrap();
        assert_eq!(written, "print(1)\n");
    }
}
