pub mod http;

pub use crate::config::bind::http::HttpBindConfig;
use serde::{Deserialize, Serialize};

/// Network binding configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BindConfig {
    /// HTTP server bind address.
    #[serde(default)]
    pub http: HttpBindConfig,
}
