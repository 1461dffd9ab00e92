//! Anonymous usage pulse
//!
//! Asset requests trigger a best-effort sample of container counts from one
//! agent. Sampling runs on a detached task tied to the server shutdown token,
//! never to the request, and its failures are only logged.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logdeck_core::{AgentClient, ClientError, count_running};

use crate::config::Config;

/// One anonymized usage sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSample {
    pub client_id: String,
    pub total_containers: usize,
    pub running_containers: usize,
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("No agent available for sampling")]
    NoAgent,

    #[error("Sampling failed: {0}")]
    Agent(#[from] ClientError),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Destination of usage samples
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn send(&self, sample: UsageSample) -> Result<(), AnalyticsError>;
}

/// Posts samples as JSON to an HTTP endpoint
pub struct HttpBeacon {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBeacon {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AnalyticsSink for HttpBeacon {
    async fn send(&self, sample: UsageSample) -> Result<(), AnalyticsError> {
        self.client
            .post(&self.endpoint)
            .json(&sample)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AnalyticsError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Records samples as tracing events
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn send(&self, sample: UsageSample) -> Result<(), AnalyticsError> {
        tracing::debug!(
            client_id = %sample.client_id,
            total = sample.total_containers,
            running = sample.running_containers,
            "usage sample"
        );
        Ok(())
    }
}

/// Fire-and-forget usage sampler
#[derive(Clone)]
pub struct UsagePulse {
    sink: Arc<dyn AnalyticsSink>,
    client_id: String,
    shutdown: CancellationToken,
}

impl UsagePulse {
    pub fn new(sink: Arc<dyn AnalyticsSink>, client_id: String, shutdown: CancellationToken) -> Self {
        Self {
            sink,
            client_id,
            shutdown,
        }
    }

    /// Pulse with the sink selected by `config` and this machine's client id
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Self {
        let sink: Arc<dyn AnalyticsSink> = match &config.analytics_endpoint {
            Some(endpoint) => Arc::new(HttpBeacon::new(endpoint.clone())),
            None => Arc::new(TracingSink),
        };
        Self::new(sink, machine_client_id(), shutdown)
    }

    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sample `agent` and send the result on a detached task
    ///
    /// The returned handle may be dropped; the task runs to completion or
    /// until shutdown either way.
    pub fn fire(&self, agent: Option<Arc<dyn AgentClient>>) -> JoinHandle<()> {
        let pulse = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = pulse.shutdown.cancelled() => {
                    tracing::debug!("usage pulse cancelled by shutdown");
                }
                result = pulse.sample_and_send(agent) => {
                    if let Err(e) = result {
                        tracing::debug!(error = %e, "usage pulse failed");
                    }
                }
            }
        })
    }

    async fn sample_and_send(&self, agent: Option<Arc<dyn AgentClient>>) -> Result<(), AnalyticsError> {
        let agent = agent.ok_or(AnalyticsError::NoAgent)?;
        let containers = agent.list_containers().await?;
        let (total, running) = count_running(&containers);

        self.sink
            .send(UsageSample {
                client_id: self.client_id.clone(),
                total_containers: total,
                running_containers: running,
            })
            .await
    }
}

/// SHA-256 of a host name, hex encoded
pub fn anonymized_client_id(hostname: &str) -> String {
    hex::encode(Sha256::digest(hostname.as_bytes()))
}

/// Anonymized id of the machine the gateway runs on
pub fn machine_client_id() -> String {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default();
    anonymized_client_id(&hostname)
}
