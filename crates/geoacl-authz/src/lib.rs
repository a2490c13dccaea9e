//! Rule model and evaluation primitives for the geoacl access-control engine.
//!
//! # Purpose
//! Defines the data-access and admin rule model, the request and answer types,
//! the per-dimension matcher ([`PolicyFilter`]) and the merge of matched rules
//! into one answer ([`coalesce`]).
//!
//! # How it fits
//! Stores (`geoacl-store`) hold rules and publish [`AclEvent`]s; the engine
//! (`geoacl-engine`) pulls candidates from a store, narrows them with
//! [`PolicyFilter`] and merges them with [`coalesce`]. Everything here is pure
//! and safe to call concurrently.
//!
//! # Key invariants
//! - `None` in a rule identifier field is the wildcard.
//! - Lower priority values take precedence; the top match alone decides the
//!   grant.
//! - Grant payloads are carried by [`Access`], so DENY rules cannot hold layer
//!   details and ALLOW rules cannot hold limits.
//!
//! # Examples
//! ```rust
//! use geoacl_authz::{AccessRequest, GrantType, PolicyFilter, Rule, RuleId,
//!     UnsupportedGeometryOps, coalesce};
//!
//! let rules = vec![
//!     Rule::allow().with_id(RuleId::new(1)).with_priority(10).with_rolename("p1"),
//!     Rule::deny().with_id(RuleId::new(2)).with_priority(20).with_rolename("p2"),
//! ];
//! let request = AccessRequest::new().with_roles(["p2"]);
//! let matched = PolicyFilter::new(&request).filter_rules(rules.iter());
//! let info = coalesce(matched, &UnsupportedGeometryOps).expect("coalesce");
//! assert_eq!(info.grant, GrantType::Deny);
//! ```
//!
//! # Common pitfalls
//! - A request address that does not parse matches nothing; it is not ignored.
//! - An empty `allowed_styles` or `attributes` on an answer means unrestricted.

mod access_info;
mod address;
mod admin_rule;
mod coalesce;
mod errors;
mod events;
mod filter;
mod geometry;
mod request;
mod rule;
mod types;

pub use access_info::{AccessInfo, AdminAccessInfo};
pub use address::IpAddressRange;
pub use admin_rule::{AdminGrantType, AdminRule, AdminRuleIdentifier};
pub use coalesce::coalesce;
pub use errors::{AuthzError, AuthzResult};
pub use events::{AclEvent, AdminRuleEvent, EventType, RuleEvent};
pub use filter::{PolicyFilter, matches, matches_admin};
pub use geometry::{Geometry, GeometryOps, UnsupportedGeometryOps};
pub use request::{AccessRequest, AdminAccessRequest};
pub use rule::{
    Access, AccessLevel, CatalogMode, GrantType, LayerAttribute, LayerDetails, Rule,
    RuleIdentifier, RuleLimits, SpatialFilterType,
};
pub use types::{AdminRuleId, RuleId};
