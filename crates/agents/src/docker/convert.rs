//! Conversions from Docker Engine models to logdeck types

use bollard::container::{LogOutput, Stats};
use bollard::models::{ContainerInspectResponse, ContainerSummary, EventMessage};
use chrono::{DateTime, TimeZone, Utc};

use logdeck_core::{Container, ContainerEvent, ContainerStat, LogLine, OutputStream};

pub fn container_from_summary(summary: ContainerSummary, host: &str) -> Container {
    let id = summary.id.unwrap_or_default();
    let name = summary
        .names
        .as_deref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_else(|| short_id(&id));

    Container {
        name,
        id,
        image: summary.image.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        created: summary
            .created
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_default(),
        tty: false,
        host: host.to_string(),
    }
}

pub fn container_from_inspect(inspect: ContainerInspectResponse, host: &str) -> Container {
    let state = inspect
        .state
        .as_ref()
        .and_then(|state| state.status.as_ref())
        .map(|status| status.to_string())
        .unwrap_or_default();
    let config = inspect.config.unwrap_or_default();

    Container {
        id: inspect.id.unwrap_or_default(),
        name: inspect
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        image: config.image.unwrap_or_default(),
        status: state.clone(),
        state,
        created: inspect
            .created
            .as_deref()
            .and_then(|created| DateTime::parse_from_rfc3339(created).ok())
            .map(|created| created.with_timezone(&Utc))
            .unwrap_or_default(),
        tty: config.tty.unwrap_or(false),
        host: host.to_string(),
    }
}

/// Container event, or `None` for messages without an action or actor
pub fn event_from_message(message: EventMessage, host: &str) -> Option<ContainerEvent> {
    let action = message.action?;
    let actor_id = message.actor.and_then(|actor| actor.id)?;
    let time = match (message.time_nano, message.time) {
        (Some(nanos), _) => Some(Utc.timestamp_nanos(nanos)),
        (None, Some(secs)) => Utc.timestamp_opt(secs, 0).single(),
        (None, None) => None,
    };

    Some(ContainerEvent {
        name: action,
        actor_id,
        host: host.to_string(),
        time,
    })
}

pub fn stat_from_stats(stats: &Stats, id: &str) -> ContainerStat {
    let usage = stats.memory_stats.usage.unwrap_or(0);
    ContainerStat {
        id: id.to_string(),
        cpu_percent: cpu_percent(
            stats.cpu_stats.cpu_usage.total_usage,
            stats.precpu_stats.cpu_usage.total_usage,
            stats.cpu_stats.system_cpu_usage.unwrap_or(0),
            stats.precpu_stats.system_cpu_usage.unwrap_or(0),
            stats.cpu_stats.online_cpus.unwrap_or(1),
        ),
        memory_percent: memory_percent(usage, stats.memory_stats.limit.unwrap_or(0)),
        memory_usage: usage,
    }
}

/// CPU share between two samples, scaled by the number of online CPUs
pub fn cpu_percent(total: u64, previous_total: u64, system: u64, previous_system: u64, cpus: u64) -> f64 {
    let cpu_delta = total.saturating_sub(previous_total) as f64;
    let system_delta = system.saturating_sub(previous_system) as f64;
    if cpu_delta > 0.0 && system_delta > 0.0 {
        cpu_delta / system_delta * cpus as f64 * 100.0
    } else {
        0.0
    }
}

pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    usage as f64 / limit as f64 * 100.0
}

/// Split one log frame into lines; stdin frames are dropped
pub fn lines_from_output(output: LogOutput) -> Vec<LogLine> {
    let (stream, message) = match output {
        LogOutput::StdErr { message } => (OutputStream::Stderr, message),
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            (OutputStream::Stdout, message)
        }
        LogOutput::StdIn { .. } => return Vec::new(),
    };

    String::from_utf8_lossy(&message)
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|text| LogLine {
            stream,
            text: text.to_string(),
        })
        .collect()
}

fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}
