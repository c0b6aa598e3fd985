//! Audio/Video domain modules.

pub mod command;
