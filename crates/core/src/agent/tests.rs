//! Unit tests for agent module

use super::*;
use futures_util::StreamExt;
use futures_util::stream;

/// Mock agent client for testing
struct MockAgent {
    host: Host,
}

#[async_trait]
impl AgentClient for MockAgent {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn list_containers(&self) -> ClientResult<Vec<Container>> {
        Ok(vec![])
    }

    async fn find_container(&self, id: &str) -> ClientResult<Container> {
        Err(ClientError::ContainerNotFound(id.to_string()))
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
            api_version: "1.43".to_string(),
            os_type: Some("linux".to_string()),
        })
    }
}

fn mock() -> MockAgent {
    MockAgent {
        host: Host::new("mock", "tcp://127.0.0.1:2375"),
    }
}

#[test]
fn test_host_name() {
    let agent = mock();
    assert_eq!(agent.host().name, "mock");
}

#[test]
fn test_host_serialization_hides_endpoint() {
    let json = serde_json::to_string(mock().host()).unwrap();
    assert_eq!(json, r#"{"name":"mock"}"#);
}

#[tokio::test]
async fn test_find_container_not_found() {
    let err = mock().find_container("abc123").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Container not found: abc123");
}

#[tokio::test]
async fn test_ping() {
    let ping = mock().ping().await.unwrap();
    assert_eq!(ping.api_version, "1.43");
}

#[tokio::test]
async fn test_empty_streams() {
    let agent = mock();
    assert!(agent.events().next().await.is_none());
    assert!(agent.container_stats("abc").next().await.is_none());

    let mut logs = agent
        .container_logs("abc", None, StdType::All)
        .await
        .unwrap();
    assert!(logs.next().await.is_none());
}

#[test]
fn test_client_error_display() {
    let err = ClientError::Status {
        status: 500,
        message: "boom".to_string(),
    };
    assert_eq!(err.to_string(), "Agent responded with status 500: boom");
    assert!(!err.is_not_found());
}
