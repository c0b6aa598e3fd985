//! Ports - Trait definitions the application layer is written against.

pub mod queue;
pub mod repository;
pub mod scheduler;
pub mod storage;
pub mod transcoder;
