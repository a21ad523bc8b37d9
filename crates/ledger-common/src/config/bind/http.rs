use serde::{Deserialize, Serialize};

/// HTTP bind configuration for the ledger's axum server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpBindConfig {
    /// Interface to bind to. Use "0.0.0.0" to listen on all interfaces.
    pub ip: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for HttpBindConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl HttpBindConfig {
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.ip, self.port).parse()
    }
}
