//! Local adapters for a single-process deployment.

pub mod ffmpeg;
pub mod fs;
pub mod http;
pub mod memory;
pub mod queue;
pub mod scheduler;

pub use ffmpeg::FfmpegExecutor;
pub use fs::FsWorkspaces;
pub use memory::InMemoryJobStore;
pub use queue::ChannelQueue;
pub use scheduler::TokioScheduler;
