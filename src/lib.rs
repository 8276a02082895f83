//! Asset Desk
//!
//! Team operations desk for shared ad-platform assets:
//! - Unified projection of profiles, business managers, ad accounts and pages
//! - Filtering, search and multi-selection over the projected list
//! - Validated create / edit / delete workflows with an activity log
//! - Pluggable entity store (in-memory or SQLite)

pub mod activity;
pub mod api;
pub mod assets;
pub mod auth;
pub mod context;
pub mod store;
pub mod workflows;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context as _, Result};
use assets::models::TeamMember;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use store::{AssetStore, MemoryStore, SqliteStore};
use workflows::AssetManager;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub store: StoreYamlConfig,
    pub display: DisplayYamlConfig,
    /// Auth section; if absent, auth_config will be None (deny-by-default)
    pub auth: Option<AuthConfig>,
    /// Team members known to the desk, upserted at startup
    pub team_members: Vec<TeamMember>,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Which entity store backs the desk
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

/// Store configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreYamlConfig {
    pub backend: StoreBackend,
    pub sqlite_path: String,
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: "data/asset-desk.db".into(),
        }
    }
}

/// Display configuration section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DisplayYamlConfig {
    /// Minutes east of UTC used for timeline dates and "today" defaults
    pub utc_offset_minutes: i32,
}

/// Authentication configuration (HS256 bearer tokens)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret (HS256, minimum 32 characters)
    pub jwt_secret: String,
    /// JWT token lifetime in seconds (default: 28800 = 8h)
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,
}

fn default_jwt_expiry() -> u64 {
    28800 // 8 hours
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub store_backend: StoreBackend,
    pub sqlite_path: String,
    pub utc_offset_minutes: i32,
    /// Auth config; None means deny-by-default (no auth section in YAML)
    pub auth_config: Option<AuthConfig>,
    pub team_members: Vec<TeamMember>,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            Err(_) => yaml.store.backend,
        };

        // JWT_SECRET alone is enough to enable auth
        let auth_config = match (std::env::var("JWT_SECRET").ok(), yaml.auth) {
            (Some(secret), Some(auth)) => Some(AuthConfig {
                jwt_secret: secret,
                ..auth
            }),
            (Some(secret), None) => Some(AuthConfig {
                jwt_secret: secret,
                jwt_expiry_secs: default_jwt_expiry(),
            }),
            (None, auth) => auth,
        };

        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            store_backend,
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(yaml.store.sqlite_path),
            utc_offset_minutes: std::env::var("DISPLAY_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.display.utc_offset_minutes),
            auth_config,
            team_members: yaml.team_members,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AssetStore>,
    pub manager: Arc<AssetManager>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the configured store, seed team members and build the manager
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn AssetStore> = match config.store_backend {
            StoreBackend::Memory => {
                let store = MemoryStore::new();
                for member in &config.team_members {
                    store.add_team_member(member.clone()).await;
                }
                Arc::new(store)
            }
            StoreBackend::Sqlite => {
                let store = SqliteStore::open(&config.sqlite_path).with_context(|| {
                    format!("Failed to open SQLite store at {}", config.sqlite_path)
                })?;
                for member in &config.team_members {
                    store.upsert_team_member(member)?;
                }
                Arc::new(store)
            }
        };
        tracing::info!(
            backend = %config.store_backend,
            team_members = config.team_members.len(),
            "Entity store ready"
        );
        Ok(Self::with_store(store, config))
    }

    /// Build state over an already-open store
    pub fn with_store(store: Arc<dyn AssetStore>, config: Config) -> Self {
        let manager = AssetManager::new(store.clone())
            .with_utc_offset_minutes(config.utc_offset_minutes);
        Self {
            store,
            manager: Arc::new(manager),
            config: Arc::new(config),
        }
    }
}

/// Build the router for `state`
pub fn build_router(state: &AppState) -> axum::Router {
    let server_state = Arc::new(api::handlers::ServerState {
        manager: state.manager.clone(),
        auth_config: state.config.auth_config.clone(),
    });
    api::create_router(server_state)
}

/// Open the store and serve the HTTP API until the process stops
pub async fn start_server(config: Config) -> Result<()> {
    if config.auth_config.is_none() {
        tracing::warn!("No auth section configured: every API request will be rejected");
    }
    let port = config.server_port;
    let state = AppState::new(config).await?;
    let app = build_router(&state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Asset desk listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
