use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Root directory under which per-request workspaces are created.
pub fn default_scratch_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("clipsight")
        .join("scratch")
}

/// A request-private scratch directory, removed with its whole subtree on drop.
///
/// Removal failure is logged and otherwise ignored so it never masks the
/// outcome of the request that owned the workspace.
#[derive(Debug)]
pub struct ScopedWorkspace {
    id: Uuid,
    path: PathBuf,
}

impl ScopedWorkspace {
    pub async fn open(root: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(root).await?;

        let id = Uuid::new_v4();
        let path = root.join(format!("req-{}", id.simple()));
        // create_dir (not create_dir_all) so a collision is an error, not a shared directory
        fs::create_dir(&path).await?;

        debug!(workspace = %path.display(), "workspace opened");
        Ok(Self { id, path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates (if needed) and returns a subdirectory of the workspace.
    pub async fn subdir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.path.join(name);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

impl Drop for ScopedWorkspace {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(workspace = %self.path.display(), "workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                workspace = %self.path.display(),
                error = %e,
                "failed to remove workspace"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[tokio::test]
    async fn workspace_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = ScopedWorkspace::open(root.path()).await.unwrap();
        let path = ws.path().to_path_buf();

        let frames = ws.subdir("frames").await.unwrap();
        std::fs::write(frames.join("f_000001.jpg"), b"x").unwrap();
        assert!(path.is_dir());

        drop(ws);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn workspace_is_removed_when_scope_fails() {
        async fn failing_step(root: &Path) -> Result<(), (PathBuf, &'static str)> {
            let ws = ScopedWorkspace::open(root).await.expect("open workspace");
            std::fs::write(ws.path().join("partial.mp4"), b"half").expect("write");
            Err((ws.path().to_path_buf(), "fetch failed"))
        }

        let root = tempfile::tempdir().unwrap();
        let (path, _) = failing_step(root.path()).await.unwrap_err();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn concurrent_workspaces_never_collide() {
        let root = tempfile::tempdir().unwrap();
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let root = root.path().to_path_buf();
                tokio::spawn(async move { ScopedWorkspace::open(&root).await })
            })
            .collect();

        let mut workspaces = Vec::new();
        for handle in handles {
            workspaces.push(handle.await.unwrap().unwrap());
        }

        let unique: HashSet<&Path> = workspaces.iter().map(|w| w.path()).collect();
        assert_eq!(unique.len(), workspaces.len());
    }

    #[tokio::test]
    async fn drop_tolerates_already_removed_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = ScopedWorkspace::open(root.path()).await.unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        drop(ws);
    }
}
