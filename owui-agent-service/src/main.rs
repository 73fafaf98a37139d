//! OpenWebUI Agents Gateway
//!
//! Composition root: resolves configuration, builds the upstream client,
//! catalog cache, filter policy, executor and dispatcher, then serves the
//! selected transport until EOF (stdio) or Ctrl-C.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use owui_catalog::{AgentCatalog, CatalogCache, FilterPolicy};
use owui_core::{load_environment, GatewayConfig};
use owui_mcp::{DispatcherConfig, McpDispatcher, SseTransport, StdioTransport, TaskExecutor, Transport};
use owui_upstream::{OpenWebUiClient, OpenWebUiConfig, SharedUpstream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Stdio,
    Sse,
}

#[derive(Parser, Debug)]
#[command(name = "owui-agent-server")]
#[command(about = "Expose OpenWebUI models as MCP agents over stdio or SSE")]
#[command(version)]
struct Args {
    /// Transport to serve
    #[arg(short, long, value_enum, default_value = "stdio")]
    transport: TransportKind,

    /// Host to bind (SSE only)
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (SSE only)
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Configuration file (TOML, YAML or JSON); environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level for the gateway crates (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_file = load_environment();

    let mut config = GatewayConfig::load(args.config.as_deref())
        .context("Failed to load gateway configuration")?;
    if let Some(level) = &args.log_level {
        config.log_level = level.trim().to_lowercase();
    }

    init_tracing(&config.log_level, args.log_json)?;

    if let Some(path) = env_file {
        info!(path = %path.display(), "Loaded environment file");
    }
    info!(config = ?config, "Configuration resolved");
    if !config.has_api_key() {
        warn!("OPENWEBUI_API_KEY is not set; OpenWebUI requests will be unauthenticated");
    }

    let dispatcher = build_dispatcher(&config)?;

    let serve = async {
        match args.transport {
            TransportKind::Stdio => StdioTransport::new().serve(dispatcher).await,
            TransportKind::Sse => {
                let bind_addr = format!("{}:{}", args.host, args.port);
                SseTransport::new(bind_addr).serve(dispatcher).await
            }
        }
    };

    tokio::select! {
        result = serve => result.context("Transport failed")?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
    }

    info!("Gateway stopped");
    Ok(())
}

/// Logs go to stderr so stdout stays protocol-only for the stdio transport.
/// RUST_LOG wins over the configured level.
fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive(format!("owui_agent_service={}", level).parse()?)
            .add_directive(format!("owui_mcp={}", level).parse()?)
            .add_directive(format!("owui_catalog={}", level).parse()?)
            .add_directive(format!("owui_upstream={}", level).parse()?)
            .add_directive(format!("owui_core={}", level).parse()?)
            .add_directive("tower_http=info".parse()?),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn build_dispatcher(config: &GatewayConfig) -> Result<Arc<McpDispatcher>> {
    let client = OpenWebUiClient::new(OpenWebUiConfig::from(config))
        .context("Failed to build OpenWebUI client")?;
    let upstream: SharedUpstream = Arc::new(client);

    let cache = CatalogCache::new(upstream.clone(), config.cache_ttl());
    let policy = FilterPolicy::new(&config.agent_whitelist, &config.agent_blacklist);
    info!(
        whitelist = ?policy.whitelist(),
        blacklist = ?policy.blacklist(),
        "Agent filter policy"
    );
    let catalog = AgentCatalog::new(cache, policy);

    let executor = TaskExecutor::new(catalog.clone(), upstream)
        .with_retry_transient(config.retry_transient);

    Ok(Arc::new(McpDispatcher::new(
        DispatcherConfig::default(),
        catalog,
        executor,
    )))
}
