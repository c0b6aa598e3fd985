use crate::domain::av::command::TranscodeCommand;
use crate::ports::transcoder::{InvocationOutput, TranscodeExecutor};
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::process::Command;

/// Runs the command as a child process and captures both streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegExecutor;

impl FfmpegExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TranscodeExecutor for FfmpegExecutor {
    async fn run(&self, command: &TranscodeCommand) -> io::Result<InvocationOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(InvocationOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
