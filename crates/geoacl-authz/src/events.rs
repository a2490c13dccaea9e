//! Mutation events published by rule stores.
//!
//! Events carry only the kind of change and the affected ids; consumers that
//! need the new state read it back from the store.
use crate::{AdminRuleId, RuleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

impl EventType {
    /// Whether answers computed before this event may now be wrong.
    pub fn invalidates(&self) -> bool {
        matches!(self, EventType::Updated | EventType::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvent {
    pub event_type: EventType,
    pub rule_ids: BTreeSet<RuleId>,
}

impl RuleEvent {
    pub fn new(event_type: EventType, rule_ids: impl IntoIterator<Item = RuleId>) -> Self {
        Self {
            event_type,
            rule_ids: rule_ids.into_iter().collect(),
        }
    }

    pub fn created(id: RuleId) -> Self {
        Self::new(EventType::Created, [id])
    }

    pub fn updated(ids: impl IntoIterator<Item = RuleId>) -> Self {
        Self::new(EventType::Updated, ids)
    }

    pub fn deleted(id: RuleId) -> Self {
        Self::new(EventType::Deleted, [id])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRuleEvent {
    pub event_type: EventType,
    pub rule_ids: BTreeSet<AdminRuleId>,
}

impl AdminRuleEvent {
    pub fn new(event_type: EventType, rule_ids: impl IntoIterator<Item = AdminRuleId>) -> Self {
        Self {
            event_type,
            rule_ids: rule_ids.into_iter().collect(),
        }
    }

    pub fn created(id: AdminRuleId) -> Self {
        Self::new(EventType::Created, [id])
    }

    pub fn updated(ids: impl IntoIterator<Item = AdminRuleId>) -> Self {
        Self::new(EventType::Updated, ids)
    }

    pub fn deleted(id: AdminRuleId) -> Self {
        Self::new(EventType::Deleted, [id])
    }
}

/// Either kind of store mutation, as carried on the invalidation channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AclEvent {
    Rule(RuleEvent),
    AdminRule(AdminRuleEvent),
}

impl AclEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AclEvent::Rule(_) => "rule",
            AclEvent::AdminRule(_) => "admin_rule",
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            AclEvent::Rule(event) => event.event_type,
            AclEvent::AdminRule(event) => event.event_type,
        }
    }
}

impl From<RuleEvent> for AclEvent {
    fn from(event: RuleEvent) -> Self {
        AclEvent::Rule(event)
    }
}

impl From<AdminRuleEvent> for AclEvent {
    fn from(event: AdminRuleEvent) -> Self {
        AclEvent::AdminRule(event)
    }
}
