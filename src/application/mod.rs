//! Application layer - Services that drive the ports.

pub mod jobs;
pub mod worker;
