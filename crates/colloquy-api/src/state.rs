//! Application state wiring the engine together.
//!
//! The engine types are generic over store and upstream traits; AppState
//! pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use colloquy_core::query::{HistoryService, OrchestratorSettings, QueryOrchestrator};
use colloquy_core::session::SessionManager;
use colloquy_core::sync::Reconciler;
use colloquy_infra::config::{load_service_config, resolve_data_dir, store_urls};
use colloquy_infra::generation::create_generator;
use colloquy_infra::generation::gemini::GeminiClient;
use colloquy_infra::retrieval::HttpRetrievalClient;
use colloquy_infra::sqlite::durable::SqliteDurableStore;
use colloquy_infra::sqlite::fast::SqliteFastStore;
use colloquy_infra::sqlite::pool::DatabasePool;
use colloquy_types::config::ServiceConfig;

/// Concrete type aliases for the engine generics pinned to infra implementations.
pub type ConcreteOrchestrator =
    QueryOrchestrator<SqliteFastStore, SqliteDurableStore, HttpRetrievalClient, GeminiClient>;

pub type ConcreteHistory = HistoryService<SqliteDurableStore>;

pub type ConcreteReconciler = Reconciler<SqliteFastStore, SqliteDurableStore>;

/// Both stores, opened and migrated.
#[derive(Clone)]
pub struct Stores {
    pub fast: Arc<SqliteFastStore>,
    pub durable: Arc<SqliteDurableStore>,
}

impl Stores {
    pub async fn open(config: &ServiceConfig, data_dir: &std::path::Path) -> anyhow::Result<Self> {
        let (durable_url, fast_url) = store_urls(config, data_dir);

        let durable_pool = DatabasePool::durable(&durable_url)
            .await
            .with_context(|| format!("failed to open durable store at {durable_url}"))?;
        let fast_pool = DatabasePool::fast(&fast_url)
            .await
            .with_context(|| format!("failed to open fast store at {fast_url}"))?;

        Ok(Self {
            fast: Arc::new(SqliteFastStore::new(fast_pool)),
            durable: Arc::new(SqliteDurableStore::new(durable_pool)),
        })
    }

    pub fn reconciler(&self) -> ConcreteReconciler {
        Reconciler::new(Arc::clone(&self.fast), Arc::clone(&self.durable))
    }
}

/// Shared state for the HTTP handlers and the background scheduler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub history: Arc<ConcreteHistory>,
    pub reconciler: Arc<ConcreteReconciler>,
    pub config: Arc<ServiceConfig>,
    pub data_dir: PathBuf,
}

/// Resolve the data directory, make sure it exists, and load its config.
pub async fn load_environment() -> anyhow::Result<(ServiceConfig, PathBuf)> {
    let data_dir = resolve_data_dir();
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let config = load_service_config(&data_dir).await;
    Ok((config, data_dir))
}

impl AppState {
    /// Initialize the full application state: config, stores, upstream clients.
    pub async fn init() -> anyhow::Result<Self> {
        let (config, data_dir) = load_environment().await?;
        let stores = Stores::open(&config, &data_dir).await?;
        let generator = create_generator(&config.generation).with_context(|| {
            format!(
                "generation client unavailable; set {}",
                config.generation.api_key_env
            )
        })?;
        Self::build(config, data_dir, stores, generator)
    }

    /// Wire the engine from already-constructed parts.
    pub fn build(
        config: ServiceConfig,
        data_dir: PathBuf,
        stores: Stores,
        generator: GeminiClient,
    ) -> anyhow::Result<Self> {
        let retriever = HttpRetrievalClient::new(
            config.retrieval.base_url.clone(),
            Duration::from_secs(config.retrieval.timeout_secs),
        )?;

        let sessions = SessionManager::new(
            Arc::clone(&stores.fast),
            Arc::clone(&stores.durable),
            Duration::from_secs(config.session_ttl_secs),
            config.reconcile.hydrate_entries,
        );
        let settings = OrchestratorSettings {
            knowledge_language: config.knowledge_language.clone(),
            ..OrchestratorSettings::default()
        };
        let orchestrator =
            QueryOrchestrator::new(sessions, Arc::new(retriever), Arc::new(generator), settings);

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            history: Arc::new(HistoryService::new(Arc::clone(&stores.durable))),
            reconciler: Arc::new(stores.reconciler()),
            config: Arc::new(config),
            data_dir,
        })
    }
}
