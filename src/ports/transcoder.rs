use crate::domain::av::command::TranscodeCommand;
use async_trait::async_trait;
use std::io;

/// What an external run left behind. A process killed by a signal has no
/// exit code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs the external transcoder. `Err` means the process could not be
/// started at all; a non-zero exit is reported through `InvocationOutput`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscodeExecutor: Send + Sync {
    async fn run(&self, command: &TranscodeCommand) -> io::Result<InvocationOutput>;
}
