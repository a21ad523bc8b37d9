use serde::{Deserialize, Serialize};

/// A logical service name unique across the system, created on first registration.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub service_id: String,
    pub name: String,
    pub bootstrap_secret_ref: String,
    pub active_kid: String,
    /// JSON-encoded `Vec<String>`.
    pub publishes: String,
    /// JSON-encoded `Vec<String>`.
    pub consumes: String,
    /// JSON-encoded map.
    pub meta: String,
    pub region: String,
    pub ttl_s: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Service {
    pub fn publishes_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.publishes).unwrap_or_default()
    }

    pub fn consumes_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.consumes).unwrap_or_default()
    }

    pub fn meta_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.meta).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Up,
    Down,
    Drain,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::Drain => "DRAIN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "DOWN" => InstanceStatus::Down,
            "DRAIN" => InstanceStatus::Drain,
            _ => InstanceStatus::Up,
        }
    }
}

/// A running replica of a [`Service`], deduplicated across restarts by
/// `(service_id, node_id, task_slot)` when that triple is fully set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceInstance {
    pub instance_id: String,
    pub service_id: String,
    pub node_id: Option<String>,
    pub task_slot: Option<i64>,
    pub boot_id: Option<String>,
    pub base_url: String,
    pub health_url: String,
    pub heartbeat_interval_sec: i64,
    pub status: String,
    pub last_heartbeat_at: Option<i64>,
    pub consecutive_miss: i64,
    pub push_kid: String,
    pub meta: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ServiceInstance {
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::parse(&self.status)
    }

    pub fn meta_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.meta).unwrap_or(serde_json::Value::Null)
    }

    /// Number of missed heartbeats before the instance is flipped `UP -> DOWN`.
    pub const MISS_THRESHOLD: i64 = 3;

    pub fn lease_ttl_sec(&self) -> i64 {
        self.heartbeat_interval_sec * Self::MISS_THRESHOLD
    }
}

/// Input describing one registration attempt, as decoded from the inbound request.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub service_name: String,
    pub bootstrap_secret_ref: String,
    pub node_id: Option<String>,
    pub task_slot: Option<i64>,
    pub boot_id: Option<String>,
    pub base_url: String,
    pub health_url: Option<String>,
    pub heartbeat_interval_sec: Option<i64>,
    pub meta: Option<serde_json::Value>,
}

impl RegisterInput {
    pub fn resolved_health_url(&self) -> String {
        self.health_url
            .clone()
            .unwrap_or_else(|| format!("{}/health", self.base_url.trim_end_matches('/')))
    }

    pub fn resolved_heartbeat_interval_sec(&self) -> i64 {
        self.heartbeat_interval_sec.unwrap_or(10).clamp(1, 3600)
    }
}

/// Outcome of a registration: the service row, the instance row, whether
/// anything materially changed (driving the registry version bump), and the
/// current fleet-wide registry version after the attempt.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub service: Service,
    pub instance: ServiceInstance,
    pub changed: bool,
    pub registry_version: i64,
}
