//! Data-access rules and their grant-dependent payloads.
//!
//! # Purpose
//! A [`Rule`] maps an identifier tuple (who, where, what) to a grant. ALLOW
//! rules may carry [`LayerDetails`]; LIMIT rules may carry [`RuleLimits`].
//! The payload lives inside [`Access`], so a DENY rule with layer details
//! cannot be expressed at all.
//!
//! # Key invariants
//! - `None` in any identifier field is the "match any" wildcard.
//! - `priority` is assigned and kept unique by the owning store; lower values
//!   take precedence.
//! - Rules are plain values: the `with_*` helpers return new values and the
//!   store is the only place a persisted rule changes.
//!
//! # Examples
//! ```rust
//! use geoacl_authz::{GrantType, Rule};
//!
//! let rule = Rule::allow().with_priority(10).with_rolename("p1").with_layer("roads");
//! assert_eq!(rule.grant(), GrantType::Allow);
//! assert_eq!(rule.identifier.layer.as_deref(), Some("roads"));
//! ```
use crate::{AuthzError, Geometry, IpAddressRange, RuleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrantType {
    Allow,
    Deny,
    Limit,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Allow => "ALLOW",
            GrantType::Deny => "DENY",
            GrantType::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(GrantType::Allow),
            "DENY" => Ok(GrantType::Deny),
            "LIMIT" => Ok(GrantType::Limit),
            _ => Err(AuthzError::InvalidGrant(value.to_string())),
        }
    }
}

/// Attribute access level. Ordering is by permissiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    None,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpatialFilterType {
    Intersect,
    Clip,
}

/// How a restricted layer shows up in catalogs. Ordering is by permissiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CatalogMode {
    Hide,
    Mixed,
    Challenge,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub access: AccessLevel,
}

impl LayerAttribute {
    pub fn new(name: impl Into<String>, access: AccessLevel) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            access,
        }
    }

    pub fn none(name: impl Into<String>) -> Self {
        Self::new(name, AccessLevel::None)
    }

    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name, AccessLevel::Read)
    }

    pub fn write(name: impl Into<String>) -> Self {
        Self::new(name, AccessLevel::Write)
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

/// Per-layer constraints attached to an ALLOW rule bound to a fixed layer.
///
/// An empty `allowed_styles` set means "any style".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cql_filter_read: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cql_filter_write: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_area: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_filter_type: Option<SpatialFilterType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_mode: Option<CatalogMode>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_styles: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<LayerAttribute>,
}

impl LayerDetails {
    pub fn with_allowed_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_styles = styles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = LayerAttribute>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    pub fn with_allowed_area(mut self, area: Geometry) -> Self {
        self.allowed_area = Some(area);
        self
    }

    pub fn with_spatial_filter_type(mut self, filter_type: SpatialFilterType) -> Self {
        self.spatial_filter_type = Some(filter_type);
        self
    }

    pub fn with_catalog_mode(mut self, mode: CatalogMode) -> Self {
        self.catalog_mode = Some(mode);
        self
    }

    pub fn with_default_style(mut self, style: impl Into<String>) -> Self {
        self.default_style = Some(style.into());
        self
    }

    pub fn with_cql_filter_read(mut self, cql: impl Into<String>) -> Self {
        self.cql_filter_read = Some(cql.into());
        self
    }

    pub fn with_cql_filter_write(mut self, cql: impl Into<String>) -> Self {
        self.cql_filter_write = Some(cql.into());
        self
    }
}

/// Spatial restriction attached to a LIMIT rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_area: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial_filter_type: Option<SpatialFilterType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_mode: Option<CatalogMode>,
}

impl RuleLimits {
    pub fn with_allowed_area(mut self, area: Geometry) -> Self {
        self.allowed_area = Some(area);
        self
    }

    pub fn with_spatial_filter_type(mut self, filter_type: SpatialFilterType) -> Self {
        self.spatial_filter_type = Some(filter_type);
        self
    }

    pub fn with_catalog_mode(mut self, mode: CatalogMode) -> Self {
        self.catalog_mode = Some(mode);
        self
    }
}

/// Grant plus the payload that grant is allowed to carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "grant", rename_all = "UPPERCASE")]
pub enum Access {
    Allow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer_details: Option<LayerDetails>,
    },
    Deny,
    Limit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limits: Option<RuleLimits>,
    },
}

impl Access {
    pub fn empty(grant: GrantType) -> Self {
        match grant {
            GrantType::Allow => Access::Allow {
                layer_details: None,
            },
            GrantType::Deny => Access::Deny,
            GrantType::Limit => Access::Limit { limits: None },
        }
    }

    pub fn grant_type(&self) -> GrantType {
        match self {
            Access::Allow { .. } => GrantType::Allow,
            Access::Deny => GrantType::Deny,
            Access::Limit { .. } => GrantType::Limit,
        }
    }

    pub fn layer_details(&self) -> Option<&LayerDetails> {
        match self {
            Access::Allow { layer_details } => layer_details.as_ref(),
            _ => None,
        }
    }

    pub fn limits(&self) -> Option<&RuleLimits> {
        match self {
            Access::Limit { limits } => limits.as_ref(),
            _ => None,
        }
    }
}

/// Per-dimension match fields. `None` means "match any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfield: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_range: Option<IpAddressRange>,
}

impl fmt::Display for RuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("instance", self.instance.as_deref()),
            ("user", self.username.as_deref()),
            ("role", self.rolename.as_deref()),
            ("service", self.service.as_deref()),
            ("request", self.request.as_deref()),
            ("subfield", self.subfield.as_deref()),
            ("workspace", self.workspace.as_deref()),
            ("layer", self.layer.as_deref()),
        ];
        let mut first = true;
        for (label, value) in fields {
            if let Some(value) = value {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{label}={value}")?;
                first = false;
            }
        }
        if let Some(range) = &self.address_range {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "address={range}")?;
            first = false;
        }
        if first {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(flatten)]
    pub identifier: RuleIdentifier,
    #[serde(flatten)]
    pub access: Access,
}

impl Rule {
    pub fn new(access: Access) -> Self {
        Self {
            id: None,
            external_id: None,
            name: None,
            description: None,
            priority: 0,
            identifier: RuleIdentifier::default(),
            access,
        }
    }

    pub fn allow() -> Self {
        Self::new(Access::empty(GrantType::Allow))
    }

    pub fn deny() -> Self {
        Self::new(Access::empty(GrantType::Deny))
    }

    pub fn limit() -> Self {
        Self::new(Access::empty(GrantType::Limit))
    }

    pub fn grant(&self) -> GrantType {
        self.access.grant_type()
    }

    /// The key that must be unique among non-LIMIT rules.
    pub fn identity_key(&self) -> (&RuleIdentifier, GrantType) {
        (&self.identifier, self.grant())
    }

    pub fn with_id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_identifier(mut self, identifier: RuleIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.identifier.instance = Some(instance.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.identifier.username = Some(username.into());
        self
    }

    pub fn with_rolename(mut self, rolename: impl Into<String>) -> Self {
        self.identifier.rolename = Some(rolename.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.identifier.service = Some(service.into());
        self
    }

    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.identifier.request = Some(request.into());
        self
    }

    pub fn with_subfield(mut self, subfield: impl Into<String>) -> Self {
        self.identifier.subfield = Some(subfield.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.identifier.workspace = Some(workspace.into());
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.identifier.layer = Some(layer.into());
        self
    }

    pub fn with_address_range(mut self, range: IpAddressRange) -> Self {
        self.identifier.address_range = Some(range);
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Replace the ALLOW payload; a no-op on other grants.
    pub fn with_layer_details(mut self, details: LayerDetails) -> Self {
        if let Access::Allow { layer_details } = &mut self.access {
            *layer_details = Some(details);
        }
        self
    }

    /// Replace the LIMIT payload; a no-op on other grants.
    pub fn with_limits(mut self, rule_limits: RuleLimits) -> Self {
        if let Access::Limit { limits } = &mut self.access {
            *limits = Some(rule_limits);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_type_string_roundtrip() {
        for grant in [GrantType::Allow, GrantType::Deny, GrantType::Limit] {
            assert_eq!(grant.as_str().parse::<GrantType>().ok(), Some(grant));
        }
        assert_eq!("allow".parse::<GrantType>().ok(), Some(GrantType::Allow));
        assert!("maybe".parse::<GrantType>().is_err());
    }

    #[test]
    fn access_levels_order_by_permissiveness() {
        assert!(AccessLevel::None < AccessLevel::Read);
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert!(CatalogMode::Hide < CatalogMode::Challenge);
    }

    #[test]
    fn payload_helpers_ignore_mismatched_grants() {
        let deny = Rule::deny().with_layer_details(LayerDetails::default());
        assert_eq!(deny.access, Access::Deny);

        let allow = Rule::allow().with_limits(RuleLimits::default());
        assert_eq!(allow.access.limits(), None);

        let limit = Rule::limit().with_limits(RuleLimits::default().with_catalog_mode(CatalogMode::Hide));
        assert_eq!(
            limit.access.limits().and_then(|l| l.catalog_mode),
            Some(CatalogMode::Hide)
        );
    }

    #[test]
    fn identifier_display_lists_fixed_fields() {
        let rule = Rule::allow().with_username("alice").with_layer("roads");
        assert_eq!(rule.identifier.to_string(), "user=alice, layer=roads");
        assert_eq!(RuleIdentifier::default().to_string(), "*");
    }

    #[test]
    fn rule_serde_flattens_identifier_and_grant() {
        let rule = Rule::allow()
            .with_priority(5)
            .with_rolename("editors")
            .with_layer("roads")
            .with_layer_details(LayerDetails::default().with_allowed_styles(["line"]));
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(json["grant"], "ALLOW");
        assert_eq!(json["rolename"], "editors");
        assert_eq!(json["layer_details"]["allowed_styles"][0], "line");

        let back: Rule = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, rule);
    }

    #[test]
    fn deny_rule_deserializes_without_payload() {
        let rule: Rule =
            serde_json::from_str(r#"{"priority": 3, "service": "WMS", "grant": "DENY"}"#)
                .expect("deserialize");
        assert_eq!(rule.grant(), GrantType::Deny);
        assert_eq!(rule.identifier.service.as_deref(), Some("WMS"));
    }
}
