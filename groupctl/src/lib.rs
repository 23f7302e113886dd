//! groupctl Library
//!
//! Core modules for the group control service: health polling, session
//! handling and task dispatch against the control server.

pub mod app;
pub mod authn;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod repository;
pub mod service;
pub mod status;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod workers;
