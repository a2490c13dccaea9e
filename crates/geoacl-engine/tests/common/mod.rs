//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use geoacl_authz::{AdminRule, AuthzResult, Geometry, GeometryOps, Rule};
use geoacl_engine::{AuthorizationEngine, CacheConfig, CachingAuthorizationService};
use geoacl_store::{
    AdminRuleStore, InMemoryAdminRuleStore, InMemoryRuleStore, InsertPosition, RuleStore,
    event_channel,
};
use geoacl_authz::AclEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Combines areas symbolically so merged geometry can be asserted on.
pub struct SymbolicGeometry;

impl GeometryOps for SymbolicGeometry {
    fn intersection(&self, a: &Geometry, b: &Geometry) -> AuthzResult<Geometry> {
        Ok(Geometry::new(format!("INTERSECTION({}, {})", a.wkt, b.wkt)))
    }

    fn union(&self, a: &Geometry, b: &Geometry) -> AuthzResult<Geometry> {
        Ok(Geometry::new(format!("UNION({}, {})", a.wkt, b.wkt)))
    }
}

pub struct Fixture {
    pub rules: Arc<InMemoryRuleStore>,
    pub admin_rules: Arc<InMemoryAdminRuleStore>,
    pub engine: Arc<AuthorizationEngine>,
    pub events: Option<mpsc::UnboundedReceiver<AclEvent>>,
}

impl Fixture {
    pub fn new() -> Self {
        let (publisher, events) = event_channel();
        let publisher = Arc::new(publisher);
        let rules = Arc::new(InMemoryRuleStore::with_publisher(publisher.clone()));
        let admin_rules = Arc::new(InMemoryAdminRuleStore::with_publisher(publisher));
        let engine = Arc::new(
            AuthorizationEngine::new(rules.clone(), admin_rules.clone())
                .with_geometry(Arc::new(SymbolicGeometry)),
        );
        Self {
            rules,
            admin_rules,
            engine,
            events: Some(events),
        }
    }

    pub async fn insert(&self, rule: Rule) -> Rule {
        self.rules
            .create(rule, InsertPosition::Fixed)
            .await
            .expect("create rule")
    }

    pub async fn insert_admin(&self, rule: AdminRule) -> AdminRule {
        self.admin_rules
            .create(rule, InsertPosition::Fixed)
            .await
            .expect("create admin rule")
    }

    /// Cache over this fixture's engine. Events are left for the caller.
    pub fn caching(&self) -> Arc<CachingAuthorizationService> {
        Arc::new(CachingAuthorizationService::new(
            self.engine.clone(),
            CacheConfig::default(),
            CacheConfig::default(),
        ))
    }
}
