//! Wire models for the group control server API
//!
//! Every endpoint answers with the same loose envelope (`code`, `msg` or
//! `message`, optional `data`), and not always as JSON. [`ApiResponse`]
//! normalizes whatever came back into one shape.

pub mod dispatch;
pub mod requests;
pub mod response;

pub use dispatch::{dispatch_payload, ActionType, DeviceDispatch, DispatchAction};
pub use requests::{HealthCheckRequest, LoginRequest};
pub use response::{ApiResponse, MessageDefaults};
