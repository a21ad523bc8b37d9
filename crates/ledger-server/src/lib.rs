//! The flume fleet ledger's HTTP surface: route wiring and shared state,
//! factored out of `main` so integration tests can build a router without
//! going through the CLI/process bootstrap.

pub mod background;
pub mod error;
pub mod http;
pub mod observability;
pub mod process;
pub mod state;

pub use state::AppState;
