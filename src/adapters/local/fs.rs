use crate::domain::jobs::Ticket;
use crate::domain::workspace::Workspace;
use crate::ports::storage::{StagedUpload, StorageError, WorkspaceStore};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const STAGING_PREFIX: &str = ".staging-";

/// Workspaces as directories under one root: `<root>/<ticket>`.
#[derive(Debug, Clone)]
pub struct FsWorkspaces {
    root: PathBuf,
}

impl FsWorkspaces {
    /// Create (if needed) and canonicalise the root so that every path handed
    /// to ffmpeg is absolute.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(root.as_ref()).await?;
        let root = tokio::fs::canonicalize(root.as_ref()).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete workspaces and half-received uploads left by a previous process.
    /// Only entries we could have created are touched.
    pub async fn sweep_orphans(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let ours = name.starts_with(STAGING_PREFIX) || Uuid::parse_str(&name).is_ok();
            if !ours || !entry.file_type().await?.is_dir() {
                continue;
            }
            match remove_dir_if_present(&entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove orphaned workspace {:?}: {}", entry.path(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} orphaned workspace(s) from {:?}", removed, self.root);
        }
        Ok(removed)
    }
}

#[async_trait]
impl WorkspaceStore for FsWorkspaces {
    async fn stage(&self) -> Result<StagedUpload, StorageError> {
        let root = self.root.clone();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempdir_in(root)
        })
        .await
        .map_err(io::Error::other)??;
        Ok(StagedUpload::new(dir))
    }

    async fn commit(
        &self,
        staged: StagedUpload,
        ticket: &Ticket,
    ) -> Result<Workspace, StorageError> {
        let target = self.root.join(ticket.as_str());
        let dir = staged.into_dir();
        tokio::fs::rename(dir.path(), &target).await?;
        // The staging path no longer exists, so dropping `dir` is a no-op.
        drop(dir);
        debug!("Workspace ready at {:?}", target);
        Ok(Workspace::new(target))
    }

    async fn remove(&self, workspace: &Workspace) -> Result<(), StorageError> {
        remove_dir_if_present(workspace.root()).await?;
        Ok(())
    }
}

async fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
