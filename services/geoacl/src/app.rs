//! Store, engine and cache wiring for the geoacl host.
use crate::config::AclConfig;
use crate::seed::SeedFile;
use anyhow::Result;
use geoacl_engine::{AuthorizationEngine, AuthorizationService, CachingAuthorizationService};
use geoacl_store::{InMemoryAdminRuleStore, InMemoryRuleStore, event_channel};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppState {
    pub rules: Arc<InMemoryRuleStore>,
    pub admin_rules: Arc<InMemoryAdminRuleStore>,
    pub service: Arc<dyn AuthorizationService>,
    pub cache: Option<Arc<CachingAuthorizationService>>,
    invalidation: Option<JoinHandle<()>>,
}

impl AppState {
    /// Wires the stores to one event channel and fronts the engine with the
    /// cache when enabled. Seeding happens before the worker starts draining.
    pub async fn build(config: &AclConfig) -> Result<Self> {
        let (publisher, events) = event_channel();
        let publisher = Arc::new(publisher);
        let rules = Arc::new(InMemoryRuleStore::with_publisher(publisher.clone()));
        let admin_rules = Arc::new(InMemoryAdminRuleStore::with_publisher(publisher));

        if let Some(path) = &config.rules_file {
            SeedFile::from_path(path)?
                .apply(&*rules, &*admin_rules)
                .await?;
        }

        let engine = Arc::new(AuthorizationEngine::new(
            rules.clone(),
            admin_rules.clone(),
        ));
        let mut cache = None;
        let mut invalidation = None;
        let service: Arc<dyn AuthorizationService> = if config.cache_enabled {
            let caching = Arc::new(CachingAuthorizationService::new(
                engine,
                config.rules_cache.clone(),
                config.admin_rules_cache.clone(),
            ));
            invalidation = Some(caching.clone().spawn_invalidation_worker(events));
            cache = Some(caching.clone());
            caching
        } else {
            tracing::info!("result cache disabled");
            engine
        };

        Ok(Self {
            rules,
            admin_rules,
            service,
            cache,
            invalidation,
        })
    }

    pub fn shutdown(self) {
        if let Some(worker) = self.invalidation {
            worker.abort();
        }
    }
}
