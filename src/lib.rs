//! Encode Server - Asynchronous video transcoding library
//!
//! Clients upload a video, get a ticket back, poll it and download the
//! H.264/AAC result once. A fixed pool of workers runs ffmpeg in the
//! background.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, options, workspace layout, ffmpeg command)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (in-memory store, channel queue, fs, ffmpeg, HTTP)
//! - application/: Job lifecycle and worker pool services
//! - config: Flags and environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use config::ServerConfig;
