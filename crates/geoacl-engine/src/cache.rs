//! Request-keyed answer caches with event-driven invalidation.
//!
//! # Purpose
//! Wraps any [`AuthorizationService`] with two independent caches, one for
//! access answers and one for admin answers, and evicts the entries a store
//! mutation may have made stale.
//!
//! # Key invariants
//! - Concurrent misses on one key share a single computation; failures reach
//!   every waiting caller and are never cached.
//! - UPDATED/DELETED rule events evict access answers whose
//!   `matching_rule_ids` intersect the event ids.
//! - UPDATED/DELETED admin-rule events evict admin answers and access answers
//!   whose `matching_admin_rule_id` is one of the event ids.
//! - CREATED events evict nothing. Answers cached before a new rule appeared
//!   stay until their own size or age eviction removes them.
//! - An eviction pass waits for in-flight loads to land before it scans, and
//!   loads starting during the pass wait for it to finish. A read that begins
//!   after a pass completes never sees an answer computed before it.
//!
//! # Important configuration
//! - [`CacheConfig`] per cache: `max_entries` bounds size, `expire_after`
//!   bounds age. Leaving both unset keeps entries until invalidated.
//!
//! # Examples
//! ```rust,no_run
//! use geoacl_engine::{AuthorizationEngine, CacheConfig, CachingAuthorizationService};
//! use geoacl_store::{InMemoryAdminRuleStore, InMemoryRuleStore, event_channel};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn wire() {
//! let (publisher, events) = event_channel();
//! let publisher = Arc::new(publisher);
//! let rules = Arc::new(InMemoryRuleStore::with_publisher(publisher.clone()));
//! let admin_rules = Arc::new(InMemoryAdminRuleStore::with_publisher(publisher));
//! let engine = Arc::new(AuthorizationEngine::new(rules, admin_rules));
//! let config = CacheConfig::default().with_max_entries(10_000)
//!     .with_expire_after(Duration::from_secs(300));
//! let cache = Arc::new(CachingAuthorizationService::new(engine, config.clone(), config));
//! let _worker = cache.clone().spawn_invalidation_worker(events);
//! # }
//! ```
use crate::{AuthorizationResult, AuthorizationService};
use async_trait::async_trait;
use geoacl_authz::{
    AccessInfo, AccessRequest, AclEvent, AdminAccessInfo, AdminAccessRequest, AdminRuleEvent,
    Rule, RuleEvent,
};
use moka::future::Cache;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Eviction policy for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: Option<u64>,
    pub expire_after: Option<Duration>,
}

impl CacheConfig {
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }

    fn build<K, V>(&self) -> Cache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut builder = Cache::builder();
        if let Some(max_entries) = self.max_entries {
            builder = builder.max_capacity(max_entries);
        }
        if let Some(expire_after) = self.expire_after {
            builder = builder.time_to_live(expire_after);
        }
        builder.build()
    }
}

pub struct CachingAuthorizationService {
    delegate: Arc<dyn AuthorizationService>,
    access: Cache<AccessRequest, AccessInfo>,
    admin: Cache<AdminAccessRequest, AdminAccessInfo>,
    /// Readers (lookups and loads) share it; eviction passes hold it exclusively.
    gate: RwLock<()>,
}

impl CachingAuthorizationService {
    pub fn new(
        delegate: Arc<dyn AuthorizationService>,
        rules_cache: CacheConfig,
        admin_rules_cache: CacheConfig,
    ) -> Self {
        Self {
            delegate,
            access: rules_cache.build(),
            admin: admin_rules_cache.build(),
            gate: RwLock::new(()),
        }
    }

    /// Drains `events` and evicts affected entries until every publisher is gone.
    pub fn spawn_invalidation_worker(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<AclEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle_event(&event).await;
            }
            debug!("event channel closed; invalidation worker exiting");
        })
    }

    pub async fn handle_event(&self, event: &AclEvent) {
        if !event.event_type().invalidates() {
            trace!(kind = event.kind(), "creation events do not evict");
            return;
        }
        let _pass = self.gate.write().await;
        match event {
            AclEvent::Rule(event) => self.evict_for_rules(event).await,
            AclEvent::AdminRule(event) => self.evict_for_admin_rules(event).await,
        }
    }

    async fn evict_for_rules(&self, event: &RuleEvent) {
        let stale: Vec<Arc<AccessRequest>> = self
            .access
            .iter()
            .filter(|(_, info)| event.rule_ids.iter().any(|id| info.depends_on_rule(id)))
            .map(|(key, _)| key)
            .collect();
        evict(&self.access, stale, "access").await;
    }

    async fn evict_for_admin_rules(&self, event: &AdminRuleEvent) {
        let stale_admin: Vec<Arc<AdminAccessRequest>> = self
            .admin
            .iter()
            .filter(|(_, info)| {
                event
                    .rule_ids
                    .iter()
                    .any(|id| info.depends_on_admin_rule(id))
            })
            .map(|(key, _)| key)
            .collect();
        evict(&self.admin, stale_admin, "admin").await;

        let stale_access: Vec<Arc<AccessRequest>> = self
            .access
            .iter()
            .filter(|(_, info)| {
                event
                    .rule_ids
                    .iter()
                    .any(|id| info.depends_on_admin_rule(id))
            })
            .map(|(key, _)| key)
            .collect();
        evict(&self.access, stale_access, "access").await;
    }

    pub fn access_entry_count(&self) -> u64 {
        self.access.entry_count()
    }

    pub fn admin_entry_count(&self) -> u64 {
        self.admin.entry_count()
    }

    pub async fn is_access_cached(&self, request: &AccessRequest) -> bool {
        self.access.get(request).await.is_some()
    }

    pub async fn is_admin_cached(&self, request: &AdminAccessRequest) -> bool {
        self.admin.get(request).await.is_some()
    }

    /// Applies pending size/age bookkeeping; entry counts are lazy until then.
    pub async fn run_pending_tasks(&self) {
        self.access.run_pending_tasks().await;
        self.admin.run_pending_tasks().await;
    }
}

async fn evict<K, V>(cache: &Cache<K, V>, keys: Vec<Arc<K>>, label: &'static str)
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if keys.is_empty() {
        return;
    }
    let count = keys.len();
    for key in keys {
        cache.invalidate(key.as_ref()).await;
    }
    metrics::counter!("geoacl_cache_evictions_total", "cache" => label).increment(count as u64);
    debug!(cache = label, evicted = count, "evicted stale cache entries");
}

#[async_trait]
impl AuthorizationService for CachingAuthorizationService {
    async fn get_access_info(&self, request: &AccessRequest) -> AuthorizationResult<AccessInfo> {
        let delegate = self.delegate.clone();
        let key = request.clone();
        let _load = self.gate.read().await;
        self.access
            .try_get_with(key, async move { delegate.get_access_info(request).await })
            .await
            .map_err(|err| (*err).clone())
    }

    async fn get_admin_authorization(
        &self,
        request: &AdminAccessRequest,
    ) -> AuthorizationResult<AdminAccessInfo> {
        let delegate = self.delegate.clone();
        let _load = self.gate.read().await;
        self.admin
            .try_get_with(request.clone(), async move {
                delegate.get_admin_authorization(request).await
            })
            .await
            .map_err(|err| (*err).clone())
    }

    async fn get_matching_rules(&self, request: &AccessRequest) -> AuthorizationResult<Vec<Rule>> {
        self.delegate.get_matching_rules(request).await
    }
}
