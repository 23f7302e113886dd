//! Service lifecycle module

pub mod controller;
