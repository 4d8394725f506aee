//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository/cache/oracle traits, but AppState pins
//! them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::RwLock;

use reverie_core::chat::orchestrator::{ChatSettings, SessionOrchestrator};
use reverie_core::oracle::InterpretationDispatcher;
use reverie_core::push::PushRegistry;
use reverie_core::quota::{QuotaLedger, QuotaPolicy};
use reverie_core::service::account::AccountService;
use reverie_infra::cache::MokaSessionCache;
use reverie_infra::config::{load_config, resolve_data_dir};
use reverie_infra::oracle::HttpOracle;
use reverie_infra::sqlite::chat::SqliteChatRepository;
use reverie_infra::sqlite::pool::{DatabasePool, database_url};
use reverie_infra::sqlite::token::SqliteTokenStore;
use reverie_infra::sqlite::user::SqliteUserRepository;
use reverie_types::config::ReverieConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteOrchestrator = SessionOrchestrator<
    SqliteUserRepository,
    SqliteChatRepository,
    MokaSessionCache,
    HttpOracle,
>;

pub type ConcreteAccountService = AccountService<SqliteUserRepository>;

/// Last status report sent by the relay over its socket.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub accounts: Arc<ConcreteAccountService>,
    pub push: Arc<PushRegistry>,
    pub tokens: SqliteTokenStore,
    /// `None` disables every relay endpoint.
    pub relay_secret: Option<Arc<SecretString>>,
    pub relay_status: Arc<RwLock<Option<RelayStatus>>>,
    pub config: Arc<ReverieConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: resolve the data dir, load config,
    /// connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        Self::build(data_dir, config).await
    }

    /// Wire services for an explicit data directory and configuration.
    pub async fn build(data_dir: PathBuf, config: ReverieConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let push = Arc::new(PushRegistry::from_config(&config.push));
        let policy = QuotaPolicy::from_config(&config.quota);

        // Ledger and account service each own a repository handle over the same pool.
        let ledger = QuotaLedger::new(
            SqliteUserRepository::new(db_pool.clone()),
            policy.clone(),
            config.quota.admission_mode,
        );
        let accounts = AccountService::new(
            SqliteUserRepository::new(db_pool.clone()),
            policy,
            push.clone(),
        );

        let oracle = HttpOracle::from_config(&config.oracle)?;
        let dispatcher = InterpretationDispatcher::new(oracle, config.oracle.preview_chars);

        let orchestrator = SessionOrchestrator::new(
            ledger,
            SqliteChatRepository::new(db_pool.clone()),
            MokaSessionCache::from_config(&config.cache),
            dispatcher,
            push.clone(),
            ChatSettings::from_config(&config),
        );

        let relay_secret = config
            .relay
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| Arc::new(SecretString::from(s)));

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            accounts: Arc::new(accounts),
            push,
            tokens: SqliteTokenStore::new(db_pool.clone()),
            relay_secret,
            relay_status: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }
}
