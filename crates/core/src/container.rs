//! Container, event and stats types shared by all agent transports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A container as reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Lifecycle state, e.g. `running`, `exited`
    pub state: String,
    /// Human-readable status, e.g. `Up 3 hours`
    pub status: String,
    pub created: DateTime<Utc>,
    /// Whether the container was started with a TTY (unframed logs)
    #[serde(default)]
    pub tty: bool,
    /// Name of the host the container lives on
    pub host: String,
}

impl Container {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// A container lifecycle event, e.g. `start`, `die`, `destroy`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerEvent {
    /// Event action as named by the agent
    pub name: String,
    #[serde(rename = "actorId")]
    pub actor_id: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// A resource usage sample for one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStat {
    pub id: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_usage: u64,
}

/// Liveness check answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Protocol/API version reported by the agent
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
}

/// Count `(total, running)` containers
pub fn count_running(containers: &[Container]) -> (usize, usize) {
    let running = containers.iter().filter(|c| c.is_running()).count();
    (containers.len(), running)
}
