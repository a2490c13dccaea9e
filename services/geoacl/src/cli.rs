//! Command-line surface: argument parsing and query dispatch.
use crate::app::AppState;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use geoacl_authz::{AccessRequest, AdminAccessRequest, AdminRuleId, AuthzError, RuleId};
use geoacl_engine::AuthorizationError;
use geoacl_store::{AdminRuleQuery, AdminRuleStore, RuleQuery, RuleStore};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "geoacl")]
#[command(about = "Evaluate data and admin access rules loaded from a YAML seed file")]
pub struct Cli {
    /// YAML config file (overrides GEOACL_CONFIG)
    #[arg(long)]
    pub config: Option<String>,

    /// YAML seed file with rules and admin rules (overrides GEOACL_RULES_FILE)
    #[arg(long)]
    pub rules: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merged access answer for a request
    Access(RequestArgs),
    /// Admin answer for a workspace
    Admin(AdminRequestArgs),
    /// Rules matching a request, in priority order
    Matching(RequestArgs),
    /// List data-access rules
    Rules(ListArgs),
    /// List admin rules
    AdminRules(ListArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    #[arg(long)]
    pub user: Option<String>,
    /// Role held by the user; repeatable
    #[arg(long = "role")]
    pub roles: Vec<String>,
    #[arg(long)]
    pub instance: Option<String>,
    /// Source address, IPv4 or IPv6
    #[arg(long)]
    pub source_address: Option<String>,
    #[arg(long)]
    pub service: Option<String>,
    #[arg(long)]
    pub request: Option<String>,
    #[arg(long)]
    pub subfield: Option<String>,
    #[arg(long)]
    pub workspace: Option<String>,
    #[arg(long)]
    pub layer: Option<String>,
}

impl From<RequestArgs> for AccessRequest {
    fn from(args: RequestArgs) -> Self {
        AccessRequest {
            user: args.user,
            roles: args.roles.into_iter().collect(),
            instance: args.instance,
            source_address: args.source_address,
            service: args.service,
            request: args.request,
            subfield: args.subfield,
            workspace: args.workspace,
            layer: args.layer,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct AdminRequestArgs {
    #[arg(long)]
    pub user: Option<String>,
    /// Role held by the user; repeatable
    #[arg(long = "role")]
    pub roles: Vec<String>,
    #[arg(long)]
    pub instance: Option<String>,
    #[arg(long)]
    pub workspace: Option<String>,
}

impl From<AdminRequestArgs> for AdminAccessRequest {
    fn from(args: AdminRequestArgs) -> Self {
        AdminAccessRequest {
            user: args.user,
            roles: args.roles.into_iter().collect(),
            instance: args.instance,
            workspace: args.workspace,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Maximum number of rules to print
    #[arg(long)]
    pub page_size: Option<usize>,
    /// Start listing at this rule id
    #[arg(long)]
    pub cursor: Option<u64>,
}

/// The host runs without a geometry engine, so merging two restricted areas
/// is the one evaluation failure a well-formed rule set can still hit.
fn access_failure(err: AuthorizationError) -> anyhow::Error {
    let hint = match &err {
        AuthorizationError::Evaluation(AuthzError::Geometry(_)) => {
            "evaluate access request: several matching rules restrict the area \
             and geoacl cannot combine geometries; give at most one of them an \
             allowed_area"
        }
        _ => "evaluate access request",
    };
    anyhow::Error::new(err).context(hint)
}

/// Runs one query against `state` and returns the JSON to print.
pub async fn execute(command: Command, state: &AppState) -> Result<Value> {
    let value = match command {
        Command::Access(args) => {
            let info = state
                .service
                .get_access_info(&args.into())
                .await
                .map_err(access_failure)?;
            serde_json::to_value(info)?
        }
        Command::Admin(args) => {
            let info = state
                .service
                .get_admin_authorization(&args.into())
                .await
                .context("evaluate admin request")?;
            serde_json::to_value(info)?
        }
        Command::Matching(args) => {
            let rules = state
                .service
                .get_matching_rules(&args.into())
                .await
                .context("list matching rules")?;
            serde_json::to_value(rules)?
        }
        Command::Rules(args) => {
            let mut query = RuleQuery::all();
            if let Some(page_size) = args.page_size {
                query = query.with_page_size(page_size);
            }
            if let Some(cursor) = args.cursor {
                query = query.with_next_cursor(RuleId::new(cursor));
            }
            let rules = state.rules.find_all(&query).await.context("list rules")?;
            serde_json::to_value(rules)?
        }
        Command::AdminRules(args) => {
            let mut query = AdminRuleQuery::all();
            if let Some(page_size) = args.page_size {
                query = query.with_page_size(page_size);
            }
            if let Some(cursor) = args.cursor {
                query = query.with_next_cursor(AdminRuleId::new(cursor));
            }
            let rules = state
                .admin_rules
                .find_all(&query)
                .await
                .context("list admin rules")?;
            serde_json::to_value(rules)?
        }
    };
    Ok(value)
}
