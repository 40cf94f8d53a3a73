use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::approvals::UserDirectory;
use crate::domain::user::UserId;
use crate::errors::DomainError;

/// Company-wide approval policy. A single rule is active at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub include_manager: bool,
    #[serde(default)]
    pub specific_approver_ids: Vec<UserId>,
    #[serde(default)]
    pub required_approver_ids: Vec<UserId>,
    pub min_percent: u8,
    #[serde(default)]
    pub sequential: bool,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            description: "Default approval rule".to_string(),
            include_manager: true,
            specific_approver_ids: Vec::new(),
            required_approver_ids: Vec::new(),
            min_percent: 60,
            sequential: false,
        }
    }
}

/// The part of a rule that decides an outcome, frozen onto an expense at submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub sequential: bool,
    pub min_percent: u8,
    pub specific_approver_ids: Vec<UserId>,
    pub required_approver_ids: Vec<UserId>,
}

impl Rule {
    /// Snapshot for an expense whose ledger holds `approver_ids`. Required approvers that
    /// were not assigned to this expense are dropped so they cannot stall it forever.
    pub fn policy_for(&self, approver_ids: &[UserId]) -> ApprovalPolicy {
        ApprovalPolicy {
            sequential: self.sequential,
            min_percent: self.min_percent,
            specific_approver_ids: self.specific_approver_ids.clone(),
            required_approver_ids: self
                .required_approver_ids
                .iter()
                .filter(|id| approver_ids.contains(id))
                .cloned()
                .collect(),
        }
    }

    pub fn validate<D>(&self, directory: &D) -> Result<(), DomainError>
    where
        D: UserDirectory + ?Sized,
    {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidRule("rule.name must not be blank".to_string()));
        }

        if !(1..=100).contains(&self.min_percent) {
            return Err(DomainError::InvalidRule(format!(
                "rule.min_percent must be in range 1..=100, got {}",
                self.min_percent
            )));
        }

        ensure_unique("specific_approver_ids", &self.specific_approver_ids)?;
        ensure_unique("required_approver_ids", &self.required_approver_ids)?;

        for approver_id in &self.specific_approver_ids {
            if directory.user(approver_id).is_none() {
                return Err(DomainError::InvalidRule(format!(
                    "specific approver `{approver_id}` is not a known user"
                )));
            }
        }

        for required_id in &self.required_approver_ids {
            let listed = self.specific_approver_ids.contains(required_id);
            let manager = self.include_manager && directory.manages_anyone(required_id);
            if !listed && !manager {
                return Err(DomainError::InvalidRule(format!(
                    "required approver `{required_id}` must be a specific approver or an included manager"
                )));
            }
        }

        Ok(())
    }
}

fn ensure_unique(field: &str, ids: &[UserId]) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DomainError::InvalidRule(format!("rule.{field} lists `{id}` twice")));
        }
    }
    Ok(())
}
