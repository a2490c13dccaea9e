//! Priority-ordered rule stores for the geoacl access-control engine.
//!
//! # Purpose
//! Defines the [`RuleStore`] and [`AdminRuleStore`] contracts the engine reads
//! candidates from, plus in-memory backends that enforce the priority and
//! identifier invariants and publish a mutation event for every write.
//!
//! # Key invariants
//! - Priorities are unique per store at all times; lower values take precedence.
//! - Identifier tuples are unique among non-LIMIT rules and among all admin rules.
//! - Layer details only live on ALLOW rules bound to a concrete layer.
//! - Every successful write publishes exactly one event after it is applied.
//!
//! # Important configuration
//! - Backends default to [`NoopPublisher`]; wire a [`ChannelPublisher`] to feed
//!   cache invalidation.
//!
//! # Common pitfalls
//! - `count` ignores the request address; `find_all` applies it and returns
//!   nothing for an unparseable address.
use async_trait::async_trait;
use geoacl_authz::{
    AccessRequest, AdminAccessRequest, AdminRule, AdminRuleId, LayerDetails, Rule, RuleId,
    RuleLimits,
};
use std::collections::BTreeSet;
use thiserror::Error;

pub mod admin_memory;
pub mod memory;
mod priority;
mod publish;

pub use admin_memory::InMemoryAdminRuleStore;
pub use memory::InMemoryRuleStore;
pub use priority::InsertPosition;
pub use publish::{ChannelPublisher, EventPublisher, NoopPublisher, event_channel};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected store failure: {0}")]
    Unexpected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Listing options for [`RuleStore::find_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleQuery {
    /// Only rules that could apply to this request, address included.
    pub filter: Option<AccessRequest>,
    pub page_size: Option<usize>,
    /// Only rules whose id is at least this value.
    pub next_cursor: Option<RuleId>,
}

impl RuleQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matching(request: AccessRequest) -> Self {
        Self {
            filter: Some(request),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_next_cursor(mut self, cursor: RuleId) -> Self {
        self.next_cursor = Some(cursor);
        self
    }
}

/// Listing options for [`AdminRuleStore::find_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminRuleQuery {
    pub filter: Option<AdminAccessRequest>,
    pub page_size: Option<usize>,
    pub next_cursor: Option<AdminRuleId>,
}

impl AdminRuleQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matching(request: AdminAccessRequest) -> Self {
        Self {
            filter: Some(request),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_next_cursor(mut self, cursor: AdminRuleId) -> Self {
        self.next_cursor = Some(cursor);
        self
    }
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn find_by_id(&self, id: RuleId) -> StoreResult<Option<Rule>>;
    /// Fails with `Conflict` if the priority invariant is broken.
    async fn find_one_by_priority(&self, priority: i64) -> StoreResult<Option<Rule>>;
    /// Structural count; the request address is not considered.
    async fn count(&self, filter: Option<&AccessRequest>) -> StoreResult<usize>;
    /// Rules in ascending priority order.
    async fn find_all(&self, query: &RuleQuery) -> StoreResult<Vec<Rule>>;
    async fn create(&self, rule: Rule, position: InsertPosition) -> StoreResult<Rule>;
    async fn save(&self, rule: Rule) -> StoreResult<Rule>;
    async fn delete_by_id(&self, id: RuleId) -> StoreResult<bool>;
    async fn exists_by_id(&self, id: RuleId) -> StoreResult<bool>;
    /// Moves every rule at or after `start` by `offset`. Returns the number
    /// of moved rules, or `-1` when nothing moved.
    async fn shift(&self, start: i64, offset: i64) -> StoreResult<i64>;
    async fn swap(&self, id1: RuleId, id2: RuleId) -> StoreResult<()>;
    async fn set_allowed_styles(&self, id: RuleId, styles: BTreeSet<String>) -> StoreResult<()>;
    /// `None` clears the limits.
    async fn set_limits(&self, id: RuleId, limits: Option<RuleLimits>) -> StoreResult<()>;
    /// `None` clears the details.
    async fn set_layer_details(&self, id: RuleId, details: Option<LayerDetails>)
    -> StoreResult<()>;
    async fn find_layer_details_by_rule_id(&self, id: RuleId) -> StoreResult<Option<LayerDetails>>;
}

#[async_trait]
pub trait AdminRuleStore: Send + Sync {
    async fn find_by_id(&self, id: AdminRuleId) -> StoreResult<Option<AdminRule>>;
    async fn find_one_by_priority(&self, priority: i64) -> StoreResult<Option<AdminRule>>;
    async fn count(&self, filter: Option<&AdminAccessRequest>) -> StoreResult<usize>;
    async fn find_all(&self, query: &AdminRuleQuery) -> StoreResult<Vec<AdminRule>>;
    async fn create(&self, rule: AdminRule, position: InsertPosition) -> StoreResult<AdminRule>;
    async fn save(&self, rule: AdminRule) -> StoreResult<AdminRule>;
    async fn delete_by_id(&self, id: AdminRuleId) -> StoreResult<bool>;
    async fn exists_by_id(&self, id: AdminRuleId) -> StoreResult<bool>;
    async fn shift(&self, start: i64, offset: i64) -> StoreResult<i64>;
    async fn swap(&self, id1: AdminRuleId, id2: AdminRuleId) -> StoreResult<()>;
}
