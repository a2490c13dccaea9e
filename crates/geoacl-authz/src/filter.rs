//! Per-dimension rule matching.
//!
//! # Purpose
//! Decides whether a rule applies to a request. Every dimension is checked
//! independently and the result is their conjunction.
//!
//! # Key invariants
//! - A `None` rule field matches anything; a `None` request field only
//!   matches a `None` rule field.
//! - `username` compares case-sensitively; `rolename` is a membership test
//!   against the request roles; every other text dimension ignores ASCII case.
//! - A source address that is present but unparseable matches no rule at all,
//!   wildcard-address rules included.
//!
//! # Examples
//! ```rust
//! use geoacl_authz::{AccessRequest, PolicyFilter, Rule};
//!
//! let rule = Rule::allow().with_rolename("p1").with_layer("roads");
//! let request = AccessRequest::new().with_roles(["p1"]).with_layer("ROADS");
//! assert!(PolicyFilter::new(&request).matches(&rule));
//!
//! let bad = request.clone().with_source_address("BAD");
//! assert!(PolicyFilter::new(&bad).filter_rules([&rule]).is_empty());
//! ```
use crate::{AccessRequest, AdminAccessRequest, AdminRule, IpAddressRange, Rule, RuleIdentifier};
use std::collections::BTreeSet;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceAddress {
    Absent,
    Valid(IpAddr),
    Invalid,
}

/// Matcher bound to one request, with the source address parsed once.
#[derive(Debug, Clone, Copy)]
pub struct PolicyFilter<'a> {
    request: &'a AccessRequest,
    address: SourceAddress,
}

impl<'a> PolicyFilter<'a> {
    pub fn new(request: &'a AccessRequest) -> Self {
        let address = match request.source_address.as_deref() {
            None => SourceAddress::Absent,
            Some(raw) => raw
                .trim()
                .parse::<IpAddr>()
                .map(SourceAddress::Valid)
                .unwrap_or(SourceAddress::Invalid),
        };
        Self { request, address }
    }

    pub fn request(&self) -> &'a AccessRequest {
        self.request
    }

    /// True when the request carries an address that cannot match anything.
    pub fn is_fail_closed(&self) -> bool {
        self.address == SourceAddress::Invalid
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        self.matches_structure(&rule.identifier)
            && self.matches_address(rule.identifier.address_range.as_ref())
    }

    /// Every dimension except the address range.
    pub fn matches_structure(&self, identifier: &RuleIdentifier) -> bool {
        let request = self.request;
        exact(identifier.username.as_deref(), request.user.as_deref())
            && member(identifier.rolename.as_deref(), &request.roles)
            && ignore_case(identifier.instance.as_deref(), request.instance.as_deref())
            && ignore_case(identifier.service.as_deref(), request.service.as_deref())
            && ignore_case(identifier.request.as_deref(), request.request.as_deref())
            && ignore_case(identifier.subfield.as_deref(), request.subfield.as_deref())
            && ignore_case(identifier.workspace.as_deref(), request.workspace.as_deref())
            && ignore_case(identifier.layer.as_deref(), request.layer.as_deref())
    }

    pub fn matches_address(&self, range: Option<&IpAddressRange>) -> bool {
        match (self.address, range) {
            (SourceAddress::Invalid, _) => false,
            (_, None) => true,
            (SourceAddress::Valid(address), Some(range)) => range.contains(&address),
            (SourceAddress::Absent, Some(_)) => false,
        }
    }

    /// Matching rules in the order they were supplied.
    pub fn filter_rules<'r, I>(&self, rules: I) -> Vec<&'r Rule>
    where
        I: IntoIterator<Item = &'r Rule>,
    {
        if self.is_fail_closed() {
            return Vec::new();
        }
        rules.into_iter().filter(|rule| self.matches(rule)).collect()
    }
}

/// Stateless form of [`PolicyFilter::matches`].
pub fn matches(rule: &Rule, request: &AccessRequest) -> bool {
    PolicyFilter::new(request).matches(rule)
}

/// Admin rules use the user, role, instance and workspace dimensions only.
pub fn matches_admin(rule: &AdminRule, request: &AdminAccessRequest) -> bool {
    let identifier = &rule.identifier;
    exact(identifier.username.as_deref(), request.user.as_deref())
        && member(identifier.rolename.as_deref(), &request.roles)
        && ignore_case(identifier.instance.as_deref(), request.instance.as_deref())
        && ignore_case(identifier.workspace.as_deref(), request.workspace.as_deref())
}

fn exact(rule_value: Option<&str>, request_value: Option<&str>) -> bool {
    match (rule_value, request_value) {
        (None, _) => true,
        (Some(expected), Some(actual)) => expected == actual,
        (Some(_), None) => false,
    }
}

fn ignore_case(rule_value: Option<&str>, request_value: Option<&str>) -> bool {
    match (rule_value, request_value) {
        (None, _) => true,
        (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
        (Some(_), None) => false,
    }
}

fn member(rule_role: Option<&str>, roles: &BTreeSet<String>) -> bool {
    match rule_role {
        None => true,
        Some(role) => roles.contains(role),
    }
}
