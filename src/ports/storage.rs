use crate::domain::jobs::Ticket;
use crate::domain::workspace::Workspace;
use async_trait::async_trait;
use std::io;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("workspace I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An upload being received. Dropping it deletes everything written so far.
#[derive(Debug)]
pub struct StagedUpload {
    dir: TempDir,
    has_input: bool,
    has_subtitles: bool,
}

impl StagedUpload {
    pub fn new(dir: TempDir) -> Self {
        Self {
            dir,
            has_input: false,
            has_subtitles: false,
        }
    }

    /// The staging directory laid out like the final workspace.
    pub fn layout(&self) -> Workspace {
        Workspace::new(self.dir.path())
    }

    pub fn mark_input(&mut self) {
        self.has_input = true;
    }

    pub fn mark_subtitles(&mut self) {
        self.has_subtitles = true;
    }

    pub fn has_input(&self) -> bool {
        self.has_input
    }

    pub fn has_subtitles(&self) -> bool {
        self.has_subtitles
    }

    pub fn into_dir(self) -> TempDir {
        self.dir
    }
}

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Scratch area for an upload that has not been accepted yet
    async fn stage(&self) -> Result<StagedUpload, StorageError>;

    /// Promote a complete upload to the ticket's private workspace
    async fn commit(&self, staged: StagedUpload, ticket: &Ticket)
        -> Result<Workspace, StorageError>;

    /// Delete a workspace. Succeeds if it is already gone.
    async fn remove(&self, workspace: &Workspace) -> Result<(), StorageError>;
}
