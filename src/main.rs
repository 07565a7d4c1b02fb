// Notification Gate - Main Entry Point
//
// Provides:
// - HTTP admission gate for outbound notifications
// - A client command for submitting a notification to a running gate
// - Configuration validation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notification_gate::api::{self, Notification};
use notification_gate::client::{ClientError, NotificationClient};
use notification_gate::config::{Config, LoggingConfig, StoreBackend};
use notification_gate::metrics;
use notification_gate::rate_limit::{
    Category, CounterStore, Dispatcher, FixedWindowCounter, MemoryBackend, QuotaProvider,
    RedisBackend,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_CONFIG_PATH: &str = "notification-gate.toml";

/// Interval between sweeps of expired in-memory counters
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Notification Gate: per-user, per-category notification admission control
#[derive(Parser, Debug)]
#[command(name = "notification-gate")]
#[command(author = "Notification Gate Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Per-user, per-category admission control for outbound notifications", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gate
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Listen address, overrides the configuration
        #[arg(long)]
        listen: Option<String>,

        /// Use process-local counters instead of Redis
        #[arg(long)]
        memory: bool,
    },
    /// Submit one notification to a running gate
    Send {
        /// Base URL of the gate
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,

        /// Recipient user id
        #[arg(long)]
        user: Uuid,

        /// Notification category, e.g. news-notification
        #[arg(long)]
        category: String,

        /// Message body
        #[arg(long)]
        message: String,
    },
    /// Load and validate a configuration file
    CheckConfig {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Commands::Serve {
            config,
            listen,
            memory,
        }) => {
            let config = Config::load_from_path(&config)?;
            init_tracing(&config.logging, args.verbose)?;
            serve(config, listen, memory).await?;
        }
        Some(Commands::Send {
            server,
            user,
            category,
            message,
        }) => {
            init_tracing(&LoggingConfig::default(), args.verbose)?;
            send(&server, user, category, message).await?;
        }
        Some(Commands::CheckConfig { config: path }) => {
            let config = Config::load_from_path(&path)
                .with_context(|| format!("Configuration {:?} is invalid", path))?;
            init_tracing(&config.logging, args.verbose)?;
            check_config(&config)?;
        }
        None => {
            init_tracing(&LoggingConfig::default(), args.verbose)?;
            info!("No command specified. Use \"notification-gate --help\" for usage.");
        }
    }

    Ok(())
}

/// Initialize tracing from the logging configuration
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        Level::DEBUG
    } else {
        logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))?
    };

    let builder = tracing_subscriber::fmt().with_max_level(filter).with_env_filter(
        EnvFilter::builder()
            .with_default_directive(filter.into())
            .from_env_lossy(),
    );

    match logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}

/// Run the HTTP gate until Ctrl-C
async fn serve(mut config: Config, listen: Option<String>, memory: bool) -> Result<()> {
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }
    if memory {
        config.store.backend = StoreBackend::Memory;
    }
    config.validate()?;

    info!("Notification gate v{} starting...", env!("CARGO_PKG_VERSION"));

    metrics::init().context("Failed to initialize metrics")?;

    let quotas = Arc::new(config.quota_table()?);
    for category in quotas.categories() {
        info!(category = %category, "Quota configured");
    }

    let prefix = config.store.key_prefix.clone();
    let store: Arc<dyn CounterStore> = match config.store.backend {
        StoreBackend::Redis => {
            let backend = RedisBackend::connect(&config.store.redis_url)
                .await
                .with_context(|| {
                    format!("Failed to connect to Redis at {}", config.store.redis_url)
                })?;
            backend.ping().await.context("Redis did not answer PING")?;
            Arc::new(FixedWindowCounter::with_prefix(backend, prefix))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory counters; quotas are not shared between instances");
            let backend = MemoryBackend::new();
            spawn_memory_purge(backend.clone());
            Arc::new(FixedWindowCounter::with_prefix(backend, prefix))
        }
    };

    let dispatcher = Dispatcher::new(quotas, store).with_store_timeout(config.store_timeout());

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    api::serve(listener, api::router(dispatcher)).await
}

fn spawn_memory_purge(backend: MemoryBackend) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            backend.purge_expired().await;
        }
    });
}

/// Submit one notification and report the outcome
async fn send(server: &str, user: Uuid, category: String, message: String) -> Result<()> {
    let client = NotificationClient::new(server);
    let notification = Notification::new(Category::new(category), user, message);

    match client.send(&notification).await {
        Ok(()) => {
            println!("Message Sent");
            Ok(())
        }
        Err(ClientError::TooManyMessages { retry_after }) => match retry_after {
            Some(secs) => anyhow::bail!("Too many messages of that type sent; retry in {}s", secs),
            None => anyhow::bail!("Too many messages of that type sent"),
        },
        Err(e) => Err(e).context("Failed to send notification"),
    }
}

/// Print the effective configuration summary
fn check_config(config: &Config) -> Result<()> {
    let quotas = config.quota_table()?;

    println!("Configuration OK");
    println!("  listen:  {}", config.server.listen_addr);
    println!("  store:   {:?}", config.store.backend);
    println!("  prefix:  {}", config.store.key_prefix);
    for category in quotas.categories() {
        if let Some(quota) = quotas.quota(category) {
            println!(
                "  quota:   {} limit={} window={}s",
                category,
                quota.limit(),
                quota.window().as_secs()
            );
        }
    }

    Ok(())
}
