//! Merging the matched rules of one request into a single answer.
//!
//! # Purpose
//! Turns the rules a [`PolicyFilter`](crate::PolicyFilter) accepted into an
//! [`AccessInfo`]. The grant comes from the highest-precedence match alone;
//! everything else only adds constraint detail.
//!
//! # Key invariants
//! - No match means DENY.
//! - `matching_rule_ids` records every matched rule, including the ones that
//!   did not decide, so cache invalidation stays conservative.
//! - ALLOW merges are most-permissive-wins across every matched ALLOW rule; a
//!   single ALLOW rule without layer details lifts every constraint.
//! - LIMIT merges are narrowest-wins across every matched LIMIT rule.
use crate::{
    AccessInfo, AccessLevel, AuthzResult, CatalogMode, Geometry, GeometryOps, GrantType,
    LayerDetails, Rule, RuleLimits, SpatialFilterType,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Compute the access answer for a set of matched rules.
///
/// `matched` may be in any order. Geometry is only consulted when at least two
/// areas have to be combined.
pub fn coalesce<'r, I>(matched: I, geometry: &dyn GeometryOps) -> AuthzResult<AccessInfo>
where
    I: IntoIterator<Item = &'r Rule>,
{
    let mut rules: Vec<&Rule> = matched.into_iter().collect();
    rules.sort_by_key(|rule| rule.priority);

    let Some(top) = rules.first() else {
        return Ok(AccessInfo::deny_all());
    };
    let decision = top.grant();
    trace!(decision = %decision, matched = rules.len(), "coalescing matched rules");

    let mut info = match decision {
        GrantType::Deny => AccessInfo::deny_all(),
        GrantType::Limit => merge_limits(&rules, geometry)?,
        GrantType::Allow => merge_allows(&rules, geometry)?,
    };
    info.matching_rule_ids = rules.iter().filter_map(|rule| rule.id).collect();
    Ok(info)
}

fn merge_limits(rules: &[&Rule], geometry: &dyn GeometryOps) -> AuthzResult<AccessInfo> {
    let limits: Vec<&RuleLimits> = rules
        .iter()
        .filter_map(|rule| rule.access.limits())
        .collect();

    let mut info = AccessInfo::unconstrained(GrantType::Limit);
    info.area = fold_areas(
        limits.iter().filter_map(|l| l.allowed_area.as_ref()),
        |a, b| geometry.intersection(a, b),
    )?;

    let filter_types = limits.iter().filter_map(|l| l.spatial_filter_type);
    info.spatial_filter_type = filter_types.fold(None, |acc, next| match (acc, next) {
        (Some(SpatialFilterType::Clip), _) | (_, SpatialFilterType::Clip) => {
            Some(SpatialFilterType::Clip)
        }
        _ => Some(SpatialFilterType::Intersect),
    });
    info.catalog_mode = limits.iter().filter_map(|l| l.catalog_mode).min();
    Ok(info)
}

fn merge_allows(rules: &[&Rule], geometry: &dyn GeometryOps) -> AuthzResult<AccessInfo> {
    let mut info = AccessInfo::unconstrained(GrantType::Allow);

    // One detail-less ALLOW rule grants the whole layer.
    let details: Option<Vec<&LayerDetails>> = rules
        .iter()
        .filter(|rule| rule.grant() == GrantType::Allow)
        .map(|rule| rule.access.layer_details())
        .collect();
    let Some(details) = details else {
        return Ok(info);
    };

    let mut attributes: BTreeMap<String, AccessLevel> = BTreeMap::new();
    for attribute in details.iter().flat_map(|d| d.attributes.iter()) {
        attributes
            .entry(attribute.name.clone())
            .and_modify(|level| *level = (*level).max(attribute.access))
            .or_insert(attribute.access);
    }
    info.attributes = attributes;
    info.allowed_styles = details
        .iter()
        .flat_map(|d| d.allowed_styles.iter().cloned())
        .collect();

    let areas: Option<Vec<&Geometry>> = details.iter().map(|d| d.allowed_area.as_ref()).collect();
    if let Some(areas) = areas {
        info.area = fold_areas(areas, |a, b| geometry.union(a, b))?;
        // Clipping only survives when every contributing rule clips.
        let all_clip = details
            .iter()
            .all(|d| d.spatial_filter_type == Some(SpatialFilterType::Clip));
        info.spatial_filter_type = if all_clip {
            Some(SpatialFilterType::Clip)
        } else {
            Some(SpatialFilterType::Intersect)
        };
    }

    info.cql_filter_read = or_filters(details.iter().map(|d| d.cql_filter_read.as_deref()));
    info.cql_filter_write = or_filters(details.iter().map(|d| d.cql_filter_write.as_deref()));
    info.catalog_mode = details.iter().filter_map(|d| d.catalog_mode).max();
    info.default_style = details.iter().find_map(|d| d.default_style.clone());
    Ok(info)
}

fn fold_areas<'g, I, F>(areas: I, mut combine: F) -> AuthzResult<Option<Geometry>>
where
    I: IntoIterator<Item = &'g Geometry>,
    F: FnMut(&Geometry, &Geometry) -> AuthzResult<Geometry>,
{
    let mut merged: Option<Geometry> = None;
    for area in areas {
        merged = Some(match merged {
            None => area.clone(),
            Some(current) => combine(&current, area)?,
        });
    }
    Ok(merged)
}

/// OR-combines filters; any unfiltered contributor leaves the result unfiltered.
fn or_filters<'s, I>(filters: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'s str>>,
{
    let filters: Option<Vec<&str>> = filters.into_iter().collect();
    match filters?.as_slice() {
        [] => None,
        [single] => Some((*single).to_string()),
        many => Some(
            many.iter()
                .map(|f| format!("({f})"))
                .collect::<Vec<_>>()
                .join(" OR "),
        ),
    }
}
