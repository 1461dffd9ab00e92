//! logdeck gateway binary

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use logdeck_agents::{DockerAgent, MemoryAgent};
use logdeck_core::AgentRegistry;
use logdeck_server::assets::Assets;
use logdeck_server::config::RemoteHost;
use logdeck_server::{Config, ServerState, create_router};

/// Web gateway for container logs
#[derive(Debug, Parser)]
#[command(name = "logdeck", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "LOGDECK_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,

    /// Base path every route is mounted under
    #[arg(long, env = "LOGDECK_BASE", default_value = "/")]
    base: String,

    /// Display name of this gateway, defaults to the machine hostname
    #[arg(long, env = "LOGDECK_HOSTNAME")]
    hostname: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOGDECK_LEVEL", default_value = "info")]
    level: String,

    /// Username for the login page
    #[arg(long, env = "LOGDECK_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Password for the login page
    #[arg(long, env = "LOGDECK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Disable the anonymous usage pulse
    #[arg(long, env = "LOGDECK_NO_ANALYTICS")]
    no_analytics: bool,

    /// Endpoint usage samples are posted to
    #[arg(long, env = "LOGDECK_ANALYTICS_ENDPOINT")]
    analytics_endpoint: Option<String>,

    /// Development mode
    #[arg(long, env = "LOGDECK_DEV")]
    dev: bool,

    /// Docker Engine endpoint of the local agent, the platform socket when unset
    #[arg(long, env = "DOCKER_HOST")]
    docker_host: Option<String>,

    /// Additional agents as URL|NAME
    #[arg(long, env = "LOGDECK_REMOTE_HOST", value_delimiter = ',')]
    remote_host: Vec<String>,

    /// Serve fixture containers instead of connecting to Docker
    #[arg(long, env = "LOGDECK_DEMO")]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = build_registry(&args)?;
    for name in registry.names() {
        tracing::info!(host = %name, "registered agent");
    }

    let assets = Assets::embedded();
    tracing::debug!(files = assets.len(), "loaded bundled assets");

    let hostname = match &args.hostname {
        Some(hostname) => hostname.clone(),
        None => hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let mut config = Config::new()
        .with_base(&args.base)
        .with_addr(args.addr.clone())
        .with_hostname(hostname)
        .with_dev(args.dev);
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        config = config.with_credentials(username.clone(), password.clone());
    }
    if args.no_analytics {
        config = config.without_analytics();
    }
    if let Some(endpoint) = &args.analytics_endpoint {
        config = config.with_analytics_endpoint(endpoint.clone());
    }

    let state = ServerState::new(config, registry, assets).context("failed to start server")?;
    let shutdown = state.shutdown.clone();
    let addr = state.config.addr.clone();
    let base = state.config.base.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, base = %base, "logdeck listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    Ok(())
}

fn build_registry(args: &Args) -> Result<AgentRegistry> {
    let mut registry = AgentRegistry::new();

    if args.demo {
        registry.register(Arc::new(MemoryAgent::demo("demo")))?;
        return Ok(registry);
    }

    let local = match &args.docker_host {
        Some(endpoint) => DockerAgent::connect("localhost", endpoint)
            .with_context(|| format!("invalid docker host {}", endpoint))?,
        None => DockerAgent::local("localhost").context("failed to connect to local Docker")?,
    };
    registry.register(Arc::new(local))?;

    for entry in &args.remote_host {
        let Some(remote) = RemoteHost::parse(entry) else {
            bail!("invalid remote host '{}', expected URL|NAME", entry);
        };
        let agent = DockerAgent::connect(remote.name.clone(), &remote.endpoint)
            .with_context(|| format!("invalid remote host {}", remote.endpoint))?;
        registry.register(Arc::new(agent))?;
    }

    Ok(registry)
}
