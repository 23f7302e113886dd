//! Synchronization with the control server

pub mod device_status;
