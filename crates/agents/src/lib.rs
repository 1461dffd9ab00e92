//! logdeck-agents
//!
//! Agent client implementations of the `AgentClient` trait.

pub mod docker;
pub mod memory;

pub use docker::DockerAgent;
pub use memory::MemoryAgent;
