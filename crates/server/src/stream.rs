//! Streaming dispatcher
//!
//! Binds a request's `host` route parameter to an agent and relays that
//! agent's log or event streams to the client. Host and container are
//! resolved before any byte is written, so resolution failures never leave
//! partial output. Dropping a response drops every stream feeding it, which
//! is how client disconnects reach the agents.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use logdeck_core::{
    AgentClient, ClientError, ClientResult, ContainerEvent, ContainerStat, LogEvent, StdType,
};

use crate::ServerState;
use crate::api::ApiError;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

const JSONL_CONTENT_TYPE: &str = "application/x-jsonl; charset=utf-8";

type SseStream = BoxStream<'static, Result<Event, axum::Error>>;

/// Query parameters shared by the log endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl LogQuery {
    /// Requested output streams; neither flag means both
    pub fn std_type(&self) -> StdType {
        StdType::from_flags(is_set(&self.stdout), is_set(&self.stderr))
    }

    /// Parse and validate the `from`/`to` bounds
    pub fn range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
        let start = parse_time("from", self.from.as_deref())?;
        let end = parse_time("to", self.to.as_deref())?;
        if start > end {
            return Err(ApiError::InvalidRange { start, end });
        }
        Ok((start, end))
    }
}

fn is_set(flag: &Option<String>) -> bool {
    matches!(flag.as_deref(), Some(v) if v != "0" && v != "false")
}

fn parse_time(name: &str, value: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    let value = value.ok_or_else(|| ApiError::BadRequest(format!("missing '{}' parameter", name)))?;
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| ApiError::BadRequest(format!("invalid '{}' parameter: {}", name, e)))
}

/// Resume point from a `Last-Event-ID` header, just after the last line seen
fn resume_point(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let id = headers.get("last-event-id")?.to_str().ok()?;
    let time = DateTime::parse_from_rfc3339(id).ok()?;
    Some(time.with_timezone(&Utc) + chrono::Duration::nanoseconds(1))
}

fn log_sse_event(event: &LogEvent) -> Result<Event, axum::Error> {
    let sse = Event::default().json_data(event)?;
    Ok(match event.id() {
        Some(id) => sse.id(id),
        None => sse,
    })
}

/// Tail the logs of a container as Server-Sent Events
pub async fn stream_logs(
    State(state): State<ServerState>,
    Path((host, id)): Path<(String, String)>,
    Query(query): Query<LogQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let agent = state.resolve(&host)?;
    let container = agent.find_container(&id).await?;
    let since = resume_point(&headers);
    let mut lines = agent
        .container_logs(&container.id, since, query.std_type())
        .await?;

    tracing::debug!(host = %host, container = %container.id, "log stream opened");

    let events = async_stream::stream! {
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => yield log_sse_event(&LogEvent::from_line(&line)),
                Err(e) => {
                    tracing::warn!(host = %host, container = %container.id, error = %e, "log stream failed");
                    return;
                }
            }
        }
        tracing::debug!(host = %host, container = %container.id, "container stopped");
        yield Ok(Event::default().event("container-stopped").data("end of stream"));
    };

    let events = events.take_until(state.shutdown.clone().cancelled_owned());
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response())
}

/// Download the full log of a container as a text file
pub async fn download_logs(
    State(state): State<ServerState>,
    Path((host, id)): Path<(String, String)>,
    Query(query): Query<LogQuery>,
) -> Result<Response, ApiError> {
    let agent = state.resolve(&host)?;
    let container = agent.find_container(&id).await?;
    let now = Utc::now();
    let lines = agent
        .container_logs_between(&container.id, container.created, now, query.std_type())
        .await?;

    let filename = format!("{}-{}.log", container.name, now.format("%Y-%m-%dT%H%M%S"));
    let body = lines.map(move |line| {
        line.map(|line| format!("{}\n", line.text)).inspect_err(|e| {
            tracing::warn!(host = %host, container = %id, error = %e, "log download interrupted");
        })
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Fetch the logs between `from` and `to` as JSON lines
pub async fn fetch_logs_between_dates(
    State(state): State<ServerState>,
    Path((host, id)): Path<(String, String)>,
    Query(query): Query<LogQuery>,
) -> Result<Response, ApiError> {
    let (from, to) = query.range()?;
    let agent = state.resolve(&host)?;
    let container = agent.find_container(&id).await?;

    // An empty range has nothing to fetch.
    if from == to {
        return Ok(([(header::CONTENT_TYPE, JSONL_CONTENT_TYPE)], Body::empty()).into_response());
    }

    let lines = agent
        .container_logs_between(&container.id, from, to, query.std_type())
        .await?;
    let body = lines.map(move |line| {
        line.and_then(|line| {
            let mut json = serde_json::to_string(&LogEvent::from_line(&line))?;
            json.push('\n');
            Ok::<_, ClientError>(json)
        })
        .inspect_err(|e| {
            tracing::warn!(host = %host, container = %id, error = %e, "log range interrupted");
        })
    });

    Ok(([(header::CONTENT_TYPE, JSONL_CONTENT_TYPE)], Body::from_stream(body)).into_response())
}

/// Events from every registered agent, multiplexed into one SSE stream
pub async fn stream_events(State(state): State<ServerState>) -> Response {
    let feeds: Vec<SseStream> = state.registry.list().into_iter().map(agent_feed).collect();
    let events = stream::select_all(feeds).take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response()
}

enum FeedItem {
    Event(ClientResult<ContainerEvent>),
    Stat(ClientResult<ContainerStat>),
}

/// Event feed of one agent: container snapshot, then events and stats
fn agent_feed(agent: Arc<dyn AgentClient>) -> SseStream {
    Box::pin(async_stream::stream! {
        let host = agent.host().name.clone();

        // Subscribe before the snapshot so nothing falls between the two.
        let events = agent.events();
        let containers = match agent.list_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "skipping agent in event feed");
                return;
            }
        };

        yield Event::default()
            .event("containers-changed")
            .json_data(json!({ "host": host, "containers": containers }));

        let mut sources: Vec<BoxStream<'static, FeedItem>> = vec![events.map(FeedItem::Event).boxed()];
        for container in containers.iter().filter(|c| c.is_running()) {
            sources.push(agent.container_stats(&container.id).map(FeedItem::Stat).boxed());
        }

        let mut sources = stream::select_all(sources);
        while let Some(item) = sources.next().await {
            match item {
                FeedItem::Event(Ok(event)) => {
                    yield Event::default().event("container-event").json_data(&event);
                }
                FeedItem::Stat(Ok(stat)) => {
                    yield Event::default().event("container-stat").json_data(&stat);
                }
                FeedItem::Event(Err(e)) => {
                    tracing::warn!(host = %host, error = %e, "event subscription failed");
                    return;
                }
                FeedItem::Stat(Err(e)) => {
                    tracing::debug!(host = %host, error = %e, "stats subscription failed");
                }
            }
        }
    })
}
