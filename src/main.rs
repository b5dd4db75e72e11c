// src/main.rs
//! Social login gateway entry point
use anyhow::Result;
use clap::{Parser, Subcommand};
use hashira_auth::api::server::GatewayServer;
use hashira_auth::auth::config::StorageConfig;
use hashira_auth::auth::{AuthConfig, Bucket, KvStore, SqliteStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "hashira_auth")]
#[command(about = "Social login gateway (Google, Twitter)")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// TOML configuration file; environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// Port to bind, overrides the configuration
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print one entry of the persistent store
    Lookup {
        /// subjectToUserId, userIdToUser or sessionToUserId
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    let mut config = AuthConfig::load(args.config.as_deref())?;

    match args.command {
        Some(Commands::Lookup { bucket, key }) => lookup(&config, &bucket, &key).await,
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        None => serve(config).await,
    }
}

async fn serve(config: AuthConfig) -> Result<()> {
    info!("Starting hashira_auth v{}", env!("CARGO_PKG_VERSION"));
    let server = GatewayServer::new(config).await?;
    server.start().await
}

async fn lookup(config: &AuthConfig, bucket: &str, key: &str) -> Result<()> {
    let bucket: Bucket = bucket.parse()?;
    let StorageConfig::Sqlite { database_url } = &config.storage else {
        anyhow::bail!("lookup needs the sqlite storage backend (STORAGE_BACKEND=sqlite)");
    };

    let store = SqliteStore::connect(database_url).await?;
    match store.load(bucket, key).await? {
        Some(value) => println!("{}", value),
        None => anyhow::bail!("no entry for {} in {}", key, bucket),
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=info,sqlx=warn"));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
