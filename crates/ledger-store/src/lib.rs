//! Transactional persistence for the ledger: services, instances, the
//! fleet-wide registry version counter, and the two anti-replay nonce
//! namespaces, all sharing one SQLite pool so a registration commits as a
//! single transaction.

mod db;
mod model;
mod nonce;
mod registry;
mod repository;

pub use db::Database;
pub use model::{InstanceStatus, RegisterInput, RegisterOutcome, Service, ServiceInstance};
pub use nonce::{NonceStore, RecordOutcome, SqliteNonceStorage};
pub use registry::RegistryState;
pub use repository::ServiceRepository;
