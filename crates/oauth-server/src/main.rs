//! OAuth Server - Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oauth_server::{
    Config, OAuthService,
    server::OAuthServer,
    service::sync,
    store::{MemoryStore, Store},
};

#[derive(Parser, Debug)]
#[command(name = "oauth-server")]
#[command(about = "OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Public base URL used in validation and account URLs
    #[arg(long, env = "OAUTH_BASE_URL")]
    base_url: Option<String>,

    /// Issuer reported by the validation endpoint
    #[arg(long, env = "OAUTH_ISSUER")]
    issuer: Option<String>,

    /// JSON file with clients and accounts to load at start-up
    #[arg(long, env = "OAUTH_SEED_FILE")]
    seed_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting OAuth server");

    let mut config = Config::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(issuer) = cli.issuer {
        config.issuer = issuer;
    }
    if cli.seed_file.is_some() {
        config.seed_file = cli.seed_file;
    }

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    if let Some(path) = &config.seed_file {
        let seed = sync::load_seed(path)?;
        let report = sync::apply_seed(store.as_ref(), seed).await?;
        tracing::info!(
            upserted = report.upserted,
            removed = report.removed,
            path = %path.display(),
            "Applied seed file"
        );
    }

    tracing::info!(port = cli.port, base_url = %config.base_url, "Running in HTTP mode");
    OAuthServer::new(OAuthService::new(store, config)).run_http(cli.port).await
}
