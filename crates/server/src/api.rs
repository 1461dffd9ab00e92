//! API models, errors and server state

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use logdeck_core::{AgentClient, AgentRegistry, ClientError, RegistryError};

use crate::analytics::{AnalyticsSink, UsagePulse};
use crate::assets::Assets;
use crate::auth::SessionAuth;
use crate::bootstrap::{PackagingError, Shell};
use crate::config::Config;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Request-scoped failures, mapped to an HTTP status
#[derive(Debug, Error)]
pub enum ApiError {
    /// The `host` route parameter names no registered agent
    #[error(transparent)]
    Resolution(#[from] RegistryError),

    /// The agent has no container with the requested id
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// A log range whose start lies after its end
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Malformed request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthenticated access to a gated API route
    #[error("Unauthorized")]
    Unauthorized,

    /// The agent call failed before any output was written
    #[error("Agent error: {0}")]
    Upstream(ClientError),

    /// Template rendering failed
    #[error("Render error: {0}")]
    Render(#[from] PackagingError),
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::ContainerNotFound(id) => ApiError::ContainerNotFound(id),
            other => ApiError::Upstream(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Resolution(_) | ApiError::ContainerNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRange { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Startup failures
#[derive(Debug, Error)]
pub enum ServerError {
    /// At least one agent must be configured
    #[error("No agents configured")]
    NoAgents,

    /// Shell template or manifest is unusable
    #[error(transparent)]
    Packaging(#[from] PackagingError),
}

/// Server state
///
/// Shared state across all HTTP handlers. Everything in it is either
/// read-only after construction or internally synchronized.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,

    /// Agent registry, immutable after startup
    pub registry: Arc<AgentRegistry>,

    /// Bundled static content
    pub assets: Arc<Assets>,

    /// Parsed SPA shell
    pub shell: Arc<Shell>,

    pub auth: Arc<SessionAuth>,

    /// Usage pulse, absent when analytics are disabled
    pub pulse: Option<UsagePulse>,

    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl ServerState {
    /// Create a new server state
    ///
    /// Fails when no agent is registered or when the shell cannot be loaded.
    pub fn new(config: Config, registry: AgentRegistry, assets: Assets) -> Result<Self, ServerError> {
        if registry.is_empty() {
            return Err(ServerError::NoAgents);
        }

        let shell = Shell::load(&assets, config.dev)?;
        let auth = SessionAuth::new(config.username.clone(), config.password.clone());
        let shutdown = CancellationToken::new();
        let pulse = if config.no_analytics {
            None
        } else {
            Some(UsagePulse::from_config(&config, shutdown.clone()))
        };

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            assets: Arc::new(assets),
            shell: Arc::new(shell),
            auth: Arc::new(auth),
            pulse,
            shutdown,
        })
    }

    /// Replace the analytics sink; no-op when analytics are disabled
    pub fn with_analytics_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.pulse = self.pulse.map(|pulse| pulse.with_sink(sink));
        self
    }

    /// Get the agent a `host` route parameter refers to
    pub fn resolve(&self, host: &str) -> Result<Arc<dyn AgentClient>, ApiError> {
        Ok(self.registry.resolve(host)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logdeck_agents::MemoryAgent;

    fn assets() -> Assets {
        Assets::from_entries([
            ("index.html", "<html>{{ config }}</html>"),
            ("manifest.json", "{}"),
        ])
    }

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(MemoryAgent::new("local"))).unwrap();
        registry
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(RegistryError::UnknownHost("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ClientError::ContainerNotFound("abc".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ClientError::Unreachable("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::BadRequest("from".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_response() {
        let response = ApiError::ContainerNotFound("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_state_requires_agents() {
        let result = ServerState::new(Config::new(), AgentRegistry::new(), assets());
        assert!(matches!(result, Err(ServerError::NoAgents)));
    }

    #[test]
    fn test_state_requires_shell() {
        let result = ServerState::new(Config::new(), registry(), Assets::new());
        assert!(matches!(result, Err(ServerError::Packaging(_))));
    }

    #[tokio::test]
    async fn test_state_resolve() {
        let state = ServerState::new(Config::new().without_analytics(), registry(), assets()).unwrap();
        assert!(state.pulse.is_none());
        assert!(state.resolve("local").is_ok());
        assert!(matches!(
            state.resolve("remote").err().unwrap(),
            ApiError::Resolution(_)
        ));
    }
}
