use clap::Args;

use expensa_core::domain::rule::Rule;
use expensa_core::domain::user::UserId;

use crate::commands::{with_store, CommandResult};

/// Flags left out keep the value of the active rule.
#[derive(Debug, Clone, Default, Args)]
pub struct SetArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, help = "Put the owner's manager first in line (true|false)")]
    pub include_manager: Option<bool>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated approver ids; pass an empty value to clear"
    )]
    pub specific: Option<Vec<String>>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated ids whose approval is mandatory; pass an empty value to clear"
    )]
    pub required: Option<Vec<String>>,
    #[arg(long, help = "Share of approvers that must approve, 1-100")]
    pub min_percent: Option<u8>,
    #[arg(long, help = "Approvers act one after another (true|false)")]
    pub sequential: Option<bool>,
}

impl SetArgs {
    pub fn apply_to(self, mut rule: Rule) -> Rule {
        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(description) = self.description {
            rule.description = description;
        }
        if let Some(include_manager) = self.include_manager {
            rule.include_manager = include_manager;
        }
        if let Some(specific) = self.specific {
            rule.specific_approver_ids = ids(specific);
        }
        if let Some(required) = self.required {
            rule.required_approver_ids = ids(required);
        }
        if let Some(min_percent) = self.min_percent {
            rule.min_percent = min_percent;
        }
        if let Some(sequential) = self.sequential {
            rule.sequential = sequential;
        }
        rule
    }
}

fn ids(values: Vec<String>) -> Vec<UserId> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(UserId)
        .collect()
}

pub fn show() -> CommandResult {
    with_store("rules show", |store| async move {
        let rule = store.rules().await?;
        Ok((format!("active rule `{}`", rule.name), rule))
    })
}

pub fn set(args: SetArgs) -> CommandResult {
    with_store("rules set", |store| async move {
        let current = store.rules().await?;
        let rule = store.save_rules(args.apply_to(current)).await?;
        Ok((format!("saved rule `{}`", rule.name), rule))
    })
}
