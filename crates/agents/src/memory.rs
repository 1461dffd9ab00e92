//! In-process agent backed by fixtures
//!
//! Serves a fixed set of containers, log lines and stats, and relays events
//! pushed through `emit`. Used by tests and by the server's demo mode.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::broadcast;

use logdeck_core::{
    AgentClient, ClientError, ClientResult, Container, ContainerEvent, ContainerStat,
    EventStream, Host, LogEvent, LogLine, LogLineStream, Ping, StatStream, StdType,
};

/// Fixture-backed agent client
#[derive(Debug)]
pub struct MemoryAgent {
    host: Host,
    containers: Vec<Container>,
    logs: HashMap<String, Vec<LogLine>>,
    stats: HashMap<String, Vec<ContainerStat>>,
    api_version: String,
    follow: bool,
    failing: bool,
    fail_after: Option<usize>,
    events: broadcast::Sender<ContainerEvent>,
    subscriptions: Arc<AtomicUsize>,
}

impl MemoryAgent {
    /// Create an empty agent named `name`
    pub fn new(name: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            host: Host::new(name, "memory"),
            containers: Vec::new(),
            logs: HashMap::new(),
            stats: HashMap::new(),
            api_version: "1.43".to_string(),
            follow: false,
            failing: false,
            fail_after: None,
            events,
            subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Agent preloaded with a couple of chatty containers
    pub fn demo(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        let mut agent = Self::new(name.clone()).follow_logs();

        for (id, container_name, image, state) in [
            ("d3m0a1b2c3d4", "web", "nginx:latest", "running"),
            ("d3m0e5f6a7b8", "worker", "python:3.12", "running"),
            ("d3m0c9d0e1f2", "migrate", "postgres:16", "exited"),
        ] {
            agent = agent.with_container(Container {
                id: id.to_string(),
                name: container_name.to_string(),
                image: image.to_string(),
                state: state.to_string(),
                status: state.to_string(),
                created: now - Duration::hours(2),
                tty: false,
                host: name.clone(),
            });

            let lines = (0..20)
                .map(|i| {
                    let time = now - Duration::minutes(20 - i);
                    let text = format!("{} {} line {}", time.to_rfc3339(), container_name, i);
                    if i % 7 == 6 {
                        LogLine::stderr(text)
                    } else {
                        LogLine::stdout(text)
                    }
                })
                .collect();
            agent = agent.with_logs(id, lines);
        }

        agent
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_logs(mut self, id: &str, lines: Vec<LogLine>) -> Self {
        self.logs.insert(id.to_string(), lines);
        self
    }

    pub fn with_stats(mut self, id: &str, stats: Vec<ContainerStat>) -> Self {
        self.stats.insert(id.to_string(), stats);
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Keep log streams open after the fixtures, like a live container
    pub fn follow_logs(mut self) -> Self {
        self.follow = true;
        self
    }

    /// Make every call fail as if the agent were unreachable
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Break log streams after `lines` lines, as if the agent went away mid-stream
    pub fn fail_after(mut self, lines: usize) -> Self {
        self.fail_after = Some(lines);
        self
    }

    /// Push an event to every open event subscription
    pub fn emit(&self, event: ContainerEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Number of event and stats subscriptions currently held open
    pub fn open_subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    fn check(&self) -> ClientResult<()> {
        if self.failing {
            return Err(ClientError::Unreachable(format!(
                "agent {} is down",
                self.host.name
            )));
        }
        Ok(())
    }

    fn lines(&self, id: &str, std_type: StdType) -> ClientResult<Vec<LogLine>> {
        self.check()?;
        if !self.containers.iter().any(|c| c.id == id) {
            return Err(ClientError::ContainerNotFound(id.to_string()));
        }
        Ok(self
            .logs
            .get(id)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|l| std_type.includes(l.stream))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn log_stream(&self, lines: Vec<LogLine>, follow: bool) -> LogLineStream {
        let mut lines: Vec<ClientResult<LogLine>> = lines.into_iter().map(Ok).collect();
        if let Some(limit) = self.fail_after {
            lines.truncate(limit);
            lines.push(Err(ClientError::Unreachable(format!(
                "agent {} dropped the log stream",
                self.host.name
            ))));
            return stream::iter(lines).boxed();
        }

        if follow {
            stream::iter(lines).chain(stream::pending()).boxed()
        } else {
            stream::iter(lines).boxed()
        }
    }
}

/// Decrements the open-subscription counter when a stream is dropped
struct SubscriptionGuard(Arc<AtomicUsize>);

impl SubscriptionGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentClient for MemoryAgent {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn list_containers(&self) -> ClientResult<Vec<Container>> {
        self.check()?;
        Ok(self.containers.clone())
    }

    async fn find_container(&self, id: &str) -> ClientResult<Container> {
        self.check()?;
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ClientError::ContainerNotFound(id.to_string()))
    }

    async fn container_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
        std_type: StdType,
    ) -> ClientResult<LogLineStream> {
        let lines = self
            .lines(id, std_type)?
            .into_iter()
            .filter(|line| match (since, LogEvent::from_line(line).time) {
                (Some(since), Some(time)) => time >= since,
                _ => true,
            })
            .collect();

        Ok(self.log_stream(lines, self.follow))
    }

    async fn container_logs_between(
        &self,
        id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        std_type: StdType,
    ) -> ClientResult<LogLineStream> {
        let lines = self
            .lines(id, std_type)?
            .into_iter()
            .filter(|line| {
                LogEvent::from_line(line)
                    .time
                    .is_some_and(|time| time >= from && time <= to)
            })
            .collect();

        Ok(self.log_stream(lines, false))
    }

    fn events(&self) -> EventStream {
        let failure = self.check().err();
        let mut receiver = self.events.subscribe();
        let guard = SubscriptionGuard::acquire(&self.subscriptions);

        Box::pin(async_stream::stream! {
            let _guard = guard;
            if let Some(e) = failure {
                yield Err(e);
                return;
            }
            loop {
                match receiver.recv().await {
                    Ok(event) => yield Ok::<_, ClientError>(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn container_stats(&self, id: &str) -> StatStream {
        let failure = self.check().err();
        let samples = self.stats.get(id).cloned().unwrap_or_default();
        let guard = SubscriptionGuard::acquire(&self.subscriptions);

        Box::pin(async_stream::stream! {
            let _guard = guard;
            if let Some(e) = failure {
                yield Err(e);
                return;
            }
            for sample in samples {
                yield Ok::<_, ClientError>(sample);
            }
            // Live containers keep reporting; hold the subscription open.
            futures_util::future::pending::<()>().await;
        })
    }

    async fn ping(&self) -> ClientResult<Ping> {
        self.check()?;
        Ok(Ping {
            api_version: self.api_version.clone(),
            os_type: Some("linux".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, state: &str) -> Container {
        Container {
            id: id.to_string(),
            name: id.to_string(),
            image: "alpine".to_string(),
            state: state.to_string(),
            status: state.to_string(),
            created: Utc::now(),
            tty: false,
            host: "local".to_string(),
        }
    }

    fn agent() -> MemoryAgent {
        MemoryAgent::new("local")
            .with_container(container("abc", "running"))
            .with_logs(
                "abc",
                vec![
                    LogLine::stdout("2024-03-01T10:00:00Z first"),
                    LogLine::stderr("2024-03-01T10:01:00Z second"),
                    LogLine::stdout("2024-03-01T10:02:00Z third"),
                ],
            )
    }

    fn at(minute: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2024-03-01T10:{:02}:00Z", minute))
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_find_container() {
        let agent = agent();
        assert_eq!(agent.find_container("abc").await.unwrap().id, "abc");
        assert!(agent.find_container("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_logs_filtered_by_stream() {
        let agent = agent();
        let lines: Vec<_> = agent
            .container_logs("abc", None, StdType::Stderr)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].as_ref().unwrap().text,
            "2024-03-01T10:01:00Z second"
        );
    }

    #[tokio::test]
    async fn test_logs_since() {
        let agent = agent();
        let lines: Vec<_> = agent
            .container_logs("abc", Some(at(1)), StdType::All)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_logs_between() {
        let agent = agent();
        let lines: Vec<_> = agent
            .container_logs_between("abc", at(0), at(1), StdType::All)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(lines.len(), 2);

        let empty: Vec<_> = agent
            .container_logs_between("abc", at(5), at(5), StdType::All)
            .await
            .unwrap()
            .collect()
            .await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_logs_unknown_container() {
        let err = agent()
            .container_logs("nope", None, StdType::All)
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_events_relay_and_release() {
        let agent = agent();
        let mut events = agent.events();
        assert_eq!(agent.open_subscriptions(), 1);

        let sent = agent.emit(ContainerEvent {
            name: "start".to_string(),
            actor_id: "abc".to_string(),
            host: "local".to_string(),
            time: None,
        });
        assert_eq!(sent, 1);

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.name, "start");

        drop(events);
        assert_eq!(agent.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_failing_agent() {
        let agent = agent().failing();
        assert!(agent.ping().await.is_err());
        assert!(agent.list_containers().await.is_err());

        let mut events = agent.events();
        assert!(events.next().await.unwrap().is_err());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_log_stream_breaks_after_lines() {
        let agent = agent().follow_logs().fail_after(2);
        let lines: Vec<_> = agent
            .container_logs("abc", None, StdType::All)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].as_ref().unwrap().text, "2024-03-01T10:01:00Z second");
        assert!(matches!(lines[2], Err(ClientError::Unreachable(_))));

        let lines: Vec<_> = agent
            .container_logs_between("abc", at(0), at(2), StdType::All)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(lines.len(), 3);
        assert!(lines[2].is_err());
    }

    #[tokio::test]
    async fn test_demo_agent() {
        let agent = MemoryAgent::demo("demo");
        let containers = agent.list_containers().await.unwrap();
        assert_eq!(containers.len(), 3);
        assert_eq!(logdeck_core::count_running(&containers), (3, 2));
    }
}
