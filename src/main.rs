use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gatekeep::bootstrap::{credential_store, Gateway};
use gatekeep::config::{self, GatewayConfig};
use gatekeep::server;
use gatekeep::upstream::{HttpUpstream, NoUpstream};
use gatekeep_auth::prelude::hash_password;
use gatekeep_config::prelude::{ConfigSnapshot, KeyPath};
use gatekeep_interceptors::prelude::Upstream;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// gatekeep - authorizing gateway for a search cluster
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration files (json, yaml or toml), merged in order
    #[arg(short, long, value_name = "FILE")]
    config: Vec<PathBuf>,

    /// Config override, e.g. `--set store.url=http://localhost:9200`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Serve,
    /// Print a bcrypt hash for a password (read from stdin when omitted)
    HashPassword {
        password: Option<String>,
        #[arg(long)]
        cost: Option<u32>,
    },
    /// Load and validate the configuration, then print it
    CheckConfig {
        #[arg(long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.debug, cli.log_json)?;

    let overrides = cli
        .overrides
        .iter()
        .map(|kv| format!("--{kv}"))
        .collect::<Vec<_>>();
    let (config, snapshot) = config::load(cli.config.clone(), overrides)
        .await
        .context("failed to load configuration")?;

    let result = match cli.command {
        Commands::Serve => cmd_serve(config).await,
        Commands::HashPassword { password, cost } => {
            cmd_hash_password(password, cost.unwrap_or(config.auth.bcrypt_cost))
        }
        Commands::CheckConfig { format } => cmd_check_config(&config, &snapshot, format),
    };

    if let Err(e) = result {
        error!("command failed: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

async fn cmd_serve(config: GatewayConfig) -> Result<()> {
    info!("starting gatekeep v{}", env!("CARGO_PKG_VERSION"));

    let store = credential_store(&config.store)?;
    let gateway = Gateway::new(&config, store);
    gateway.seed(&config).await?;

    let upstream: Arc<dyn Upstream> = match config.store.url.as_deref() {
        Some(url) => Arc::new(
            HttpUpstream::new(url, config.server.request_timeout)
                .map_err(|e| anyhow::anyhow!("{e}"))?,
        ),
        None => {
            tracing::warn!("no cluster url configured, proxied requests will fail with 502");
            Arc::new(NoUpstream)
        }
    };
    server::serve(config, gateway, upstream).await
}

fn cmd_hash_password(password: Option<String>, cost: u32) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    let hash = hash_password(&password, cost)?;
    println!("{hash}");
    Ok(())
}

fn cmd_check_config(config: &GatewayConfig, snapshot: &ConfigSnapshot, format: OutputFormat) -> Result<()> {
    credential_store(&config.store)?;
    if let Some(url) = config.store.url.as_deref() {
        HttpUpstream::new(url, config.server.request_timeout).map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    let effective = snapshot.redacted();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&effective)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&effective)?),
    }
    let origin = snapshot
        .origin_of(&KeyPath::new("store.url"))
        .map(|entry| entry.origin.as_str())
        .unwrap_or("defaults");
    info!(checksum = snapshot.checksum().short(), store_url_from = origin, "configuration is valid");
    Ok(())
}
