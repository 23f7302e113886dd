//! Domain models

pub mod command;
pub mod config;
pub mod device;
pub mod task;
