//! # logdeck-core
//!
//! Shared building blocks for the logdeck gateway.
//!
//! ## Features
//!
//! - Capability interface for container agents via the `AgentClient` trait
//! - Transport-neutral container, event, stats and log types
//! - Immutable, name-keyed `AgentRegistry` shared by every request handler
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use logdeck_core::AgentRegistry;
//! use logdeck_agents::DockerAgent;
//!
//! let mut registry = AgentRegistry::new();
//! registry.register(Arc::new(DockerAgent::local("localhost")?))?;
//!
//! let agent = registry.resolve("localhost")?;
//! let containers = agent.list_containers().await?;
//! ```

pub mod agent;
pub mod container;
pub mod logs;
pub mod registry;

// Convenience re-exports for common types
pub use agent::{
    AgentClient, ClientError, ClientResult, EventStream, Host, LogLineStream, StatStream,
};

pub use container::{Container, ContainerEvent, ContainerStat, Ping, count_running};

pub use logs::{LogEvent, LogLine, OutputStream, StdType};

pub use registry::{AgentRegistry, RegistryError};
