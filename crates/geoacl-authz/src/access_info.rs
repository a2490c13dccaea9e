//! Derived authorization answers.
//!
//! These values are computed per request and only ever held in caches. The
//! id bookkeeping fields (`matching_rule_ids`, `matching_admin_rule_id`) are
//! what cache invalidation keys on.
use crate::{
    AccessLevel, AdminRuleId, CatalogMode, Geometry, GrantType, RuleId, SpatialFilterType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInfo {
    pub grant: GrantType,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub matching_rule_ids: BTreeSet<RuleId>,
    /// Empty means every attribute is accessible.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AccessLevel>,
    /// Empty means every style is allowed.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_styles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_filter_type: Option<SpatialFilterType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_mode: Option<CatalogMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cql_filter_read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cql_filter_write: Option<String>,
    #[serde(default)]
    pub admin_rights: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_admin_rule_id: Option<AdminRuleId>,
}

impl AccessInfo {
    /// An answer carrying only a grant and no constraints.
    pub fn unconstrained(grant: GrantType) -> Self {
        Self {
            grant,
            matching_rule_ids: BTreeSet::new(),
            attributes: BTreeMap::new(),
            allowed_styles: BTreeSet::new(),
            area: None,
            spatial_filter_type: None,
            catalog_mode: None,
            default_style: None,
            cql_filter_read: None,
            cql_filter_write: None,
            admin_rights: false,
            matching_admin_rule_id: None,
        }
    }

    pub fn deny_all() -> Self {
        Self::unconstrained(GrantType::Deny)
    }

    pub fn is_allowed(&self) -> bool {
        self.grant != GrantType::Deny
    }

    pub fn depends_on_rule(&self, id: &RuleId) -> bool {
        self.matching_rule_ids.contains(id)
    }

    pub fn depends_on_admin_rule(&self, id: &AdminRuleId) -> bool {
        self.matching_admin_rule_id.as_ref() == Some(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccessInfo {
    pub admin: bool,
    /// Workspace the admin grant is scoped to, when `admin` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_admin_rule_id: Option<AdminRuleId>,
}

impl AdminAccessInfo {
    pub fn depends_on_admin_rule(&self, id: &AdminRuleId) -> bool {
        self.matching_admin_rule_id.as_ref() == Some(id)
    }
}
