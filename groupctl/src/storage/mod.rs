//! On-disk storage

pub mod json_file;
pub mod layout;
pub mod lock;
pub mod settings;
