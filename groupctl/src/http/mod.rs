//! Control server HTTP access

pub mod api;
pub mod client;
