//! The registration state machine, heartbeat ingestion, and admin read
//! paths, wired on top of [`ledger_store`] and [`ledger_auth`].

mod heartbeat;
mod read;
mod service;

pub use heartbeat::{HeartbeatRequest, HeartbeatService};
pub use read::{InstanceView, ReadPaths, ServiceView};
pub use service::{BootstrapRequest, RegisterResponse, RegistrationService, auth_error_code};
