//! Domain layer - Pure business logic.

// Filter graph and ffmpeg argument construction
pub mod av;

// Job records, tickets and the status state machine
pub mod jobs;

pub mod options;
pub mod workspace;
