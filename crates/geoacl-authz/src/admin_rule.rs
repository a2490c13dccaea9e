//! Workspace administration rules.
//!
//! Admin rules live in their own priority sequence and only carry the
//! instance/user/role/workspace dimensions.
use crate::AdminRuleId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminGrantType {
    Admin,
    User,
}

impl AdminGrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminGrantType::Admin => "ADMIN",
            AdminGrantType::User => "USER",
        }
    }
}

impl fmt::Display for AdminGrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminRuleIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub access: AdminGrantType,
}

impl fmt::Display for AdminRuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let any = "*";
        write!(
            f,
            "instance={}, user={}, role={}, workspace={}, access={}",
            self.instance.as_deref().unwrap_or(any),
            self.username.as_deref().unwrap_or(any),
            self.rolename.as_deref().unwrap_or(any),
            self.workspace.as_deref().unwrap_or(any),
            self.access
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AdminRuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(flatten)]
    pub identifier: AdminRuleIdentifier,
}

impl AdminRule {
    pub fn new(access: AdminGrantType) -> Self {
        Self {
            id: None,
            external_id: None,
            name: None,
            description: None,
            priority: 0,
            identifier: AdminRuleIdentifier {
                instance: None,
                username: None,
                rolename: None,
                workspace: None,
                access,
            },
        }
    }

    pub fn admin() -> Self {
        Self::new(AdminGrantType::Admin)
    }

    pub fn user() -> Self {
        Self::new(AdminGrantType::User)
    }

    pub fn access(&self) -> AdminGrantType {
        self.identifier.access
    }

    pub fn with_id(mut self, id: AdminRuleId) -> Self {
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

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.identifier.workspace = Some(workspace.into());
        self
    }

    pub fn with_access(mut self, access: AdminGrantType) -> Self {
        self.identifier.access = access;
        self
    }
}
