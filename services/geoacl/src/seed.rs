//! YAML rule seeding.
//!
//! A seed file lists rules and admin rules in the same shape the model
//! serializes to; ids are assigned by the stores.
//!
//! ```yaml
//! rules:
//!   - priority: 10
//!     rolename: EDITOR
//!     workspace: topp
//!     grant: ALLOW
//!   - priority: 20
//!     grant: DENY
//! admin_rules:
//!   - priority: 1
//!     username: alice
//!     workspace: topp
//!     access: ADMIN
//! ```
//!
//! The host has no geometry engine. An access request whose matching rules
//! carry two or more `allowed_area`s that must be merged (stacked LIMITs, or
//! ALLOWs that all restrict the area) fails with a geometry error.
use anyhow::{Context, Result};
use geoacl_authz::{AdminRule, Rule};
use geoacl_store::{AdminRuleStore, InsertPosition, RuleStore};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub rules: Vec<Rule>,
    pub admin_rules: Vec<AdminRule>,
}

impl SeedFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read rules file: {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("load rules file: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).with_context(|| "parse rules yaml")
    }

    /// Inserts every entry at its own priority, in file order.
    pub async fn apply(
        self,
        rules: &dyn RuleStore,
        admin_rules: &dyn AdminRuleStore,
    ) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        for (index, rule) in self.rules.into_iter().enumerate() {
            let label = rule.identifier.to_string();
            rules
                .create(rule, InsertPosition::Fixed)
                .await
                .with_context(|| format!("seed rule #{index} ({label})"))?;
            summary.rules += 1;
        }
        for (index, rule) in self.admin_rules.into_iter().enumerate() {
            let label = rule.identifier.to_string();
            admin_rules
                .create(rule, InsertPosition::Fixed)
                .await
                .with_context(|| format!("seed admin rule #{index} ({label})"))?;
            summary.admin_rules += 1;
        }
        info!(
            rules = summary.rules,
            admin_rules = summary.admin_rules,
            "seeded rule stores"
        );
        Ok(summary)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub rules: usize,
    pub admin_rules: usize,
}
