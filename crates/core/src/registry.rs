//! Registry of named agent clients
//!
//! Built once at startup and shared read-only afterwards. Keys are kept in a
//! `BTreeMap` so enumeration is sorted by name, which is the order the
//! browser host list expects.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::agent::AgentClient;

/// Errors raised while building or querying the registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No agent is registered under this name
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// Two agents were registered under the same name
    #[error("Host registered twice: {0}")]
    DuplicateHost(String),
}

/// Name-keyed collection of agent clients
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn AgentClient>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its host name
    pub fn register(&mut self, agent: Arc<dyn AgentClient>) -> Result<(), RegistryError> {
        let name = agent.host().name.clone();
        if self.agents.contains_key(&name) {
            return Err(RegistryError::DuplicateHost(name));
        }
        tracing::debug!(host = %name, endpoint = %agent.host().endpoint, "registered agent");
        self.agents.insert(name, agent);
        Ok(())
    }

    /// Get the agent registered under `name`
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AgentClient>, RegistryError> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownHost(name.to_string()))
    }

    /// Any registered agent, for host-agnostic work
    ///
    /// Returns the first agent in enumeration order. Callers must not rely on
    /// which one it is.
    pub fn any(&self) -> Option<Arc<dyn AgentClient>> {
        self.agents.values().next().cloned()
    }

    /// All agents, sorted by name
    pub fn list(&self) -> Vec<Arc<dyn AgentClient>> {
        self.agents.values().cloned().collect()
    }

    /// All host names, sorted
    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ClientResult, EventStream, Host, LogLineStream, StatStream};
    use crate::container::{Container, Ping};
    use crate::logs::StdType;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use futures_util::StreamExt;
    use futures_util::stream;

    struct NamedAgent {
        host: Host,
    }

    #[async_trait]
    impl AgentClient for NamedAgent {
        fn host(&self) -> &Host {
            &self.host
        }

        async fn list_containers(&self) -> ClientResult<Vec<Container>> {
            Ok(vec![])
        }

        async fn find_container(&self, id: &str) -> ClientResult<Container> {
            Err(crate::ClientError::ContainerNotFound(id.to_string()))
        }

        async fn container_logs(
            &self,
            _id: &str,
            _since: Option<DateTime<Utc>>,
            _std_type: StdType,
        ) -> ClientResult<LogLineStream> {
            Ok(stream::empty().boxed())
        }

        async fn container_logs_between(
            &self,
            _id: &str,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
            _std_type: StdType,
        ) -> ClientResult<LogLineStream> {
            Ok(stream::empty().boxed())
        }

        fn events(&self) -> EventStream {
            stream::empty().boxed()
        }

        fn container_stats(&self, _id: &str) -> StatStream {
            stream::empty().boxed()
        }

        async fn ping(&self) -> ClientResult<Ping> {
            Ok(Ping {
                api_version: self.host.name.clone(),
                os_type: None,
            })
        }
    }

    fn agent(name: &str) -> Arc<dyn AgentClient> {
        Arc::new(NamedAgent {
            host: Host::new(name, "memory"),
        })
    }

    fn registry(names: &[&str]) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for name in names {
            registry.register(agent(name)).unwrap();
        }
        registry
    }

    #[test]
    fn test_resolve_returns_same_handle() {
        let registry = registry(&["local", "remote"]);

        let first = registry.resolve("local").unwrap();
        let second = registry.resolve("local").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.host().name, "local");
    }

    #[test]
    fn test_resolve_unknown_host() {
        let registry = registry(&["local"]);

        let err = registry.resolve("nowhere").err().unwrap();
        assert_eq!(err, RegistryError::UnknownHost("nowhere".to_string()));
        assert_eq!(err.to_string(), "Unknown host: nowhere");
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = registry(&["local"]);

        let err = registry.register(agent("local")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateHost("local".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_sorted_by_name() {
        let registry = registry(&["zeta", "alpha", "mid"]);

        let names: Vec<String> = registry
            .list()
            .iter()
            .map(|a| a.host().name.clone())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.names(), names);
    }

    #[test]
    fn test_any() {
        assert!(AgentRegistry::new().any().is_none());

        let registry = registry(&["remote", "local"]);
        let picked = registry.any().unwrap();
        assert!(registry.names().contains(&picked.host().name));
    }
}
