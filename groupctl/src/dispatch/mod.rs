//! Task dispatch module

pub mod dispatcher;
