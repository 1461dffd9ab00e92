//! Docker Engine agent
//!
//! Talks to a Docker daemon through bollard. Endpoints follow the
//! `DOCKER_HOST` convention: `unix:///path/to/docker.sock`, `tcp://host:port`
//! or `http://host:port`.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    InspectContainerOptions, ListContainersOptions, LogsOptions, StatsOptions,
};
use bollard::system::EventsOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, pin_mut};

pub mod convert;

use logdeck_core::{
    AgentClient, ClientError, ClientResult, Container, EventStream, Host, LogEvent,
    LogLineStream, Ping, StatStream, StdType,
};

/// Lines fetched when tailing without a starting point
const DEFAULT_TAIL: &str = "300";

/// Seconds before a request to the daemon is abandoned
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Agent backed by a Docker Engine API endpoint
#[derive(Debug, Clone)]
pub struct DockerAgent {
    host: Host,
    docker: Docker,
}

impl DockerAgent {
    /// Create an agent named `name` for the Docker endpoint `endpoint`
    pub fn connect(name: impl Into<String>, endpoint: &str) -> ClientResult<Self> {
        let endpoint = endpoint.trim();
        let docker = if endpoint.starts_with("unix://") {
            Docker::connect_with_socket(endpoint, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        } else if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        } else {
            return Err(ClientError::Unreachable(format!(
                "unsupported Docker endpoint '{}', expected unix://, tcp:// or http://",
                endpoint
            )));
        }
        .map_err(client_error)?;

        let host = Host::new(name, endpoint);
        tracing::debug!(agent = %host.name, endpoint, "Docker agent configured");
        Ok(Self { host, docker })
    }

    /// Agent for the local daemon, honouring `DOCKER_HOST` when set
    pub fn local(name: impl Into<String>) -> ClientResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(client_error)?;
        Ok(Self {
            host: Host::new(name, "local"),
            docker,
        })
    }

    fn log_options(std_type: StdType) -> LogsOptions<String> {
        LogsOptions {
            stdout: std_type.stdout(),
            stderr: std_type.stderr(),
            timestamps: true,
            ..Default::default()
        }
    }

    /// Stream log lines, dropping any whose timestamp `keep` rejects.
    ///
    /// The daemon filters `since`/`until` at whole seconds, so callers pass
    /// the exact window through `keep`.
    fn log_lines<F>(
        &self,
        id: &str,
        options: LogsOptions<String>,
        std_type: StdType,
        keep: F,
    ) -> LogLineStream
    where
        F: Fn(Option<DateTime<Utc>>) -> bool + Send + 'static,
    {
        let docker = self.docker.clone();
        let id = id.to_string();
        Box::pin(async_stream::stream! {
            let output = docker.logs(&id, Some(options));
            pin_mut!(output);
            while let Some(frame) = output.next().await {
                match frame {
                    Ok(frame) => {
                        for line in convert::lines_from_output(frame) {
                            if std_type.includes(line.stream) && keep(LogEvent::from_line(&line).time) {
                                yield Ok::<_, ClientError>(line);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(container_error(&id, e));
                        return;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl AgentClient for DockerAgent {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn list_containers(&self) -> ClientResult<Vec<Container>> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(client_error)?;

        Ok(summaries
            .into_iter()
            .map(|summary| convert::container_from_summary(summary, &self.host.name))
            .collect())
    }

    async fn find_container(&self, id: &str) -> ClientResult<Container> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| container_error(id, e))?;

        Ok(convert::container_from_inspect(inspect, &self.host.name))
    }

    async fn container_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
        std_type: StdType,
    ) -> ClientResult<LogLineStream> {
        let options = match since {
            Some(since) => LogsOptions {
                follow: true,
                since: since.timestamp(),
                tail: "all".to_string(),
                ..Self::log_options(std_type)
            },
            None => LogsOptions {
                follow: true,
                tail: DEFAULT_TAIL.to_string(),
                ..Self::log_options(std_type)
            },
        };

        Ok(self.log_lines(id, options, std_type, move |time| {
            match (since, time) {
                (Some(since), Some(time)) => time >= since,
                _ => true,
            }
        }))
    }

    async fn container_logs_between(
        &self,
        id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        std_type: StdType,
    ) -> ClientResult<LogLineStream> {
        let options = LogsOptions {
            since: from.timestamp(),
            // `until` is exclusive at second precision
            until: to.timestamp() + 1,
            tail: "all".to_string(),
            ..Self::log_options(std_type)
        };

        Ok(self.log_lines(id, options, std_type, move |time| {
            time.is_some_and(|time| time >= from && time <= to)
        }))
    }

    fn events(&self) -> EventStream {
        let docker = self.docker.clone();
        let host = self.host.name.clone();
        Box::pin(async_stream::stream! {
            let options = EventsOptions::<String> {
                filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
                ..Default::default()
            };
            let messages = docker.events(Some(options));
            pin_mut!(messages);
            while let Some(message) = messages.next().await {
                match message {
                    Ok(message) => {
                        if let Some(event) = convert::event_from_message(message, &host) {
                            yield Ok::<_, ClientError>(event);
                        }
                    }
                    Err(e) => {
                        yield Err(client_error(e));
                        return;
                    }
                }
            }
        })
    }

    fn container_stats(&self, id: &str) -> StatStream {
        let docker = self.docker.clone();
        let id = id.to_string();
        Box::pin(async_stream::stream! {
            let options = StatsOptions {
                stream: true,
                one_shot: false,
            };
            let samples = docker.stats(&id, Some(options));
            pin_mut!(samples);
            while let Some(sample) = samples.next().await {
                match sample {
                    Ok(sample) => yield Ok::<_, ClientError>(convert::stat_from_stats(&sample, &id)),
                    Err(e) => {
                        yield Err(container_error(&id, e));
                        return;
                    }
                }
            }
        })
    }

    async fn ping(&self) -> ClientResult<Ping> {
        let version = self.docker.version().await.map_err(client_error)?;
        Ok(Ping {
            api_version: version.api_version.unwrap_or_default(),
            os_type: version.os,
        })
    }
}

/// Map a daemon error for a container-scoped call, 404 meaning the id is unknown
fn container_error(id: &str, e: bollard::errors::Error) -> ClientError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => ClientError::ContainerNotFound(id.to_string()),
        e => client_error(e),
    }
}

fn client_error(e: bollard::errors::Error) -> ClientError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => ClientError::Status {
            status: status_code,
            message,
        },
        bollard::errors::Error::JsonDataError { message, .. } => ClientError::Decode(message),
        bollard::errors::Error::JsonSerdeError { err } => ClientError::Decode(err.to_string()),
        e => ClientError::Unreachable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_keeps_endpoint_on_host() {
        let agent = DockerAgent::connect("remote", "tcp://10.0.0.2:2375").unwrap();
        assert_eq!(agent.host().name, "remote");
        assert_eq!(agent.host().endpoint, "tcp://10.0.0.2:2375");

        let agent = DockerAgent::connect("sock", "unix:///var/run/docker.sock").unwrap();
        assert_eq!(agent.host().endpoint, "unix:///var/run/docker.sock");
    }

    #[test]
    fn test_connect_rejects_unknown_scheme() {
        let err = DockerAgent::connect("remote", "ftp://10.0.0.2").unwrap_err();
        assert!(matches!(err, ClientError::Unreachable(_)));
    }

    #[test]
    fn test_log_options_flags() {
        let options = DockerAgent::log_options(StdType::Stderr);
        assert!(!options.stdout);
        assert!(options.stderr);
        assert!(options.timestamps);
        assert!(!options.follow);
    }

    #[test]
    fn test_error_mapping() {
        let missing = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc".to_string(),
        };
        assert!(container_error("abc", missing).is_not_found());

        let conflict = bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "conflict".to_string(),
        };
        assert!(matches!(
            container_error("abc", conflict),
            ClientError::Status { status: 409, .. }
        ));

        let listing = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "page not found".to_string(),
        };
        assert!(matches!(
            client_error(listing),
            ClientError::Status { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_ping() {
        // Port 9 (discard) is not expected to speak HTTP
        let agent = DockerAgent::connect("nowhere", "tcp://127.0.0.1:9").unwrap();
        let err = agent.ping().await.unwrap_err();
        assert!(matches!(err, ClientError::Unreachable(_)));
    }
}
