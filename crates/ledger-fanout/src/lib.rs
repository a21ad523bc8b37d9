//! Builds registry snapshots and pushes them, signed, to every live instance.

mod fanout;
mod snapshot;

pub use fanout::{FanoutReport, PushOutcome, fanout_snapshot};
pub use snapshot::{Capabilities, InstanceSnapshot, RegistrySnapshot, ServiceSnapshot, build_snapshot};
