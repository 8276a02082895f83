//! Asset Desk - Main Server
//!
//! Team operations desk for shared ad-platform assets.

use anyhow::{Context, Result};
use asset_desk::{auth::jwt::encode_jwt, context::Role, Config};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "asset-desk")]
#[command(about = "Asset operations desk server")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, env = "ASSET_DESK_CONFIG")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides config.yaml)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Mint a development bearer token with the configured secret
    Token {
        #[arg(long)]
        team_id: Uuid,

        #[arg(long, default_value = "member")]
        role: Role,

        /// Display name recorded on audit entries
        #[arg(long)]
        name: String,

        /// User id (random when omitted)
        #[arg(long)]
        user_id: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,asset_desk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            asset_desk::start_server(config).await
        }
        Commands::Token {
            team_id,
            role,
            name,
            user_id,
        } => {
            let auth = config
                .auth_config
                .context("No auth section configured (set auth.jwt_secret or JWT_SECRET)")?;
            let token = encode_jwt(
                user_id.unwrap_or_else(Uuid::new_v4),
                team_id,
                role,
                &name,
                &auth.jwt_secret,
                auth.jwt_expiry_secs,
            )?;
            println!("{}", token);
            Ok(())
        }
    }
}
