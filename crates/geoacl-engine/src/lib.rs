//! Authorization queries over geoacl rule stores.
//!
//! # Purpose
//! Exposes the three host-facing queries through [`AuthorizationService`]:
//! the merged access answer for a request, the admin answer for a workspace,
//! and the raw list of matching rules.
//!
//! # How it fits
//! [`AuthorizationEngine`] evaluates directly against the stores.
//! [`CachingAuthorizationService`] wraps any service with request-keyed caches
//! and is kept fresh by an invalidation worker fed from the stores' event
//! channel.
//!
//! # Key invariants
//! - Admin rules never change the ALLOW/DENY/LIMIT grant of an access answer.
//! - Matching rules are returned in ascending priority order.
//! - Eviction runs off the write path; a read racing an eviction may still see
//!   the old answer.

mod cache;
mod engine;
mod errors;

use async_trait::async_trait;
use geoacl_authz::{AccessInfo, AccessRequest, AdminAccessInfo, AdminAccessRequest, Rule};

pub use cache::{CacheConfig, CachingAuthorizationService};
pub use engine::AuthorizationEngine;
pub use errors::{AuthorizationError, AuthorizationResult};

#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn get_access_info(&self, request: &AccessRequest) -> AuthorizationResult<AccessInfo>;

    async fn get_admin_authorization(
        &self,
        request: &AdminAccessRequest,
    ) -> AuthorizationResult<AdminAccessInfo>;

    async fn get_matching_rules(&self, request: &AccessRequest) -> AuthorizationResult<Vec<Rule>>;
}
