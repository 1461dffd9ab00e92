//! Agent client abstraction module
//!
//! This module provides the `AgentClient` trait that every backend transport
//! implements, along with the `Host` descriptor the gateway exposes to the
//! browser.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub mod error;

pub use error::{ClientError, ClientResult};

use crate::container::{Container, ContainerEvent, ContainerStat, Ping};
use crate::logs::{LogLine, StdType};

/// Stream of log lines produced by an agent
pub type LogLineStream = BoxStream<'static, ClientResult<LogLine>>;

/// Stream of container lifecycle events produced by an agent
pub type EventStream = BoxStream<'static, ClientResult<ContainerEvent>>;

/// Stream of resource usage samples for one container
pub type StatStream = BoxStream<'static, ClientResult<ContainerStat>>;

/// Descriptor of the host an agent is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Unique name, used in routes and in the browser host list
    pub name: String,

    /// Address the agent talks to. Never sent to the browser.
    #[serde(skip)]
    pub endpoint: String,
}

impl Host {
    /// Create a new host descriptor
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Capability set of one named agent
///
/// Implementations are shared read-only across requests. Every stream they
/// hand out must release its underlying subscription when dropped, which is
/// how client disconnects propagate as cancellation.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Host this client is bound to
    fn host(&self) -> &Host;

    /// List every container known to the agent, running or not
    async fn list_containers(&self) -> ClientResult<Vec<Container>>;

    /// Look up a single container by id
    ///
    /// Fails with `ClientError::ContainerNotFound` when the id is unknown.
    async fn find_container(&self, id: &str) -> ClientResult<Container>;

    /// Follow the logs of a container
    ///
    /// The stream stays open until the container stops or the stream is
    /// dropped.
    async fn container_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
        std_type: StdType,
    ) -> ClientResult<LogLineStream>;

    /// Fetch the bounded slice of logs between two instants
    async fn container_logs_between(
        &self,
        id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        std_type: StdType,
    ) -> ClientResult<LogLineStream>;

    /// Subscribe to container lifecycle events
    fn events(&self) -> EventStream;

    /// Subscribe to resource usage samples of one container
    fn container_stats(&self, id: &str) -> StatStream;

    /// Liveness check
    async fn ping(&self) -> ClientResult<Ping>;
}

#[cfg(test)]
mod tests;
