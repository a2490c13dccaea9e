//! Uncached evaluation of authorization queries against the rule stores.
use crate::{AuthorizationResult, AuthorizationService};
use async_trait::async_trait;
use geoacl_authz::{
    AccessInfo, AccessRequest, AdminAccessInfo, AdminAccessRequest, AdminGrantType, AdminRule,
    GeometryOps, PolicyFilter, Rule, UnsupportedGeometryOps, coalesce, matches_admin,
};
use geoacl_store::{AdminRuleQuery, AdminRuleStore, RuleQuery, RuleStore};
use std::sync::Arc;
use tracing::debug;

/// Answers queries by reading candidates from the stores on every call.
///
/// Store listings are treated as candidate sets: every candidate is matched
/// again here, so a backend may over-approximate its filtering.
pub struct AuthorizationEngine {
    rules: Arc<dyn RuleStore>,
    admin_rules: Arc<dyn AdminRuleStore>,
    geometry: Arc<dyn GeometryOps>,
}

impl AuthorizationEngine {
    pub fn new(rules: Arc<dyn RuleStore>, admin_rules: Arc<dyn AdminRuleStore>) -> Self {
        Self {
            rules,
            admin_rules,
            geometry: Arc::new(UnsupportedGeometryOps),
        }
    }

    pub fn with_geometry(mut self, geometry: Arc<dyn GeometryOps>) -> Self {
        self.geometry = geometry;
        self
    }

    async fn top_admin_rule(
        &self,
        request: &AdminAccessRequest,
    ) -> AuthorizationResult<Option<AdminRule>> {
        let candidates = self
            .admin_rules
            .find_all(&AdminRuleQuery::matching(request.clone()))
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|rule| matches_admin(rule, request))
            .min_by_key(|rule| rule.priority))
    }
}

#[async_trait]
impl AuthorizationService for AuthorizationEngine {
    async fn get_access_info(&self, request: &AccessRequest) -> AuthorizationResult<AccessInfo> {
        let matched = self.get_matching_rules(request).await?;
        let mut info = coalesce(matched.iter(), self.geometry.as_ref())?;

        // Admin rights are reported alongside the grant but never change it.
        if let Some(admin_request) = request.admin_request() {
            let admin = self.get_admin_authorization(&admin_request).await?;
            info.admin_rights = admin.admin;
            info.matching_admin_rule_id = admin.matching_admin_rule_id;
        }
        debug!(
            grant = %info.grant,
            matched = info.matching_rule_ids.len(),
            admin = info.admin_rights,
            "access info computed"
        );
        Ok(info)
    }

    async fn get_admin_authorization(
        &self,
        request: &AdminAccessRequest,
    ) -> AuthorizationResult<AdminAccessInfo> {
        let Some(rule) = self.top_admin_rule(request).await? else {
            debug!("no admin rule matched");
            return Ok(AdminAccessInfo::default());
        };
        let admin = rule.access() == AdminGrantType::Admin;
        let workspace = if admin {
            rule.identifier
                .workspace
                .clone()
                .or_else(|| request.workspace.clone())
        } else {
            None
        };
        debug!(admin_rule_id = ?rule.id, admin, "admin authorization computed");
        Ok(AdminAccessInfo {
            admin,
            workspace,
            matching_admin_rule_id: rule.id,
        })
    }

    async fn get_matching_rules(&self, request: &AccessRequest) -> AuthorizationResult<Vec<Rule>> {
        let filter = PolicyFilter::new(request);
        if filter.is_fail_closed() {
            debug!(
                address = request.source_address.as_deref().unwrap_or_default(),
                "unparseable source address; matching nothing"
            );
            return Ok(Vec::new());
        }
        let candidates = self
            .rules
            .find_all(&RuleQuery::matching(request.clone()))
            .await?;
        let mut matched: Vec<Rule> = candidates
            .into_iter()
            .filter(|rule| filter.matches(rule))
            .collect();
        matched.sort_by_key(|rule| rule.priority);
        Ok(matched)
    }
}
