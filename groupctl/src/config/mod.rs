//! Runtime configuration

pub mod store;
