//! Server configuration, from flags or environment variables.

use crate::domain::av::command::{TranscodeSettings, DEFAULT_MAX_WIDTH};
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(name = "encode-server", version, about = "Asynchronous ffmpeg transcoding service")]
pub struct ServerConfig {
    /// HTTP server bind address
    #[arg(long, env = "ADDR", default_value = "0.0.0.0")]
    pub addr: String,

    /// HTTP server port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of concurrent transcoding workers
    #[arg(long, env = "WORKERS", default_value = "3")]
    pub workers: NonZeroUsize,

    /// Directory holding one workspace per job
    #[arg(long, env = "WORKSPACE_DIR", default_value = "temp")]
    pub workspace_dir: PathBuf,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    pub ffmpeg_bin: String,

    /// Output width cap in pixels
    #[arg(long, env = "MAX_WIDTH", default_value_t = DEFAULT_MAX_WIDTH)]
    pub max_width: u32,

    /// Delay between a completed download and workspace removal
    #[arg(long, env = "CLEANUP_DELAY_MS", default_value_t = 1000)]
    pub cleanup_delay_ms: u64,

    /// Reject submissions once this many jobs are waiting (unbounded if unset)
    #[arg(long, env = "MAX_QUEUED_JOBS")]
    pub max_queued_jobs: Option<usize>,

    /// Serve a test upload form at `/`
    #[arg(long, env = "UPLOAD_FORM", default_value_t = false)]
    pub upload_form: bool,
}

impl ServerConfig {
    /// Load a `.env` file if present, then parse flags and environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    pub fn transcode_settings(&self) -> TranscodeSettings {
        TranscodeSettings {
            program: self.ffmpeg_bin.clone(),
            max_width: self.max_width,
        }
    }
}
