use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rule::ApprovalPolicy;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpenseId(pub String);

impl ExpenseId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Draft,
    Submitted,
    InReview,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Submitted is transient but still counts as awaiting a decision.
    pub fn awaits_decision(self) -> bool {
        matches!(self, Self::Submitted | Self::InReview)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalEntryStatus {
    Blocked,
    Pending,
    Approved,
    Rejected,
}

impl ApprovalEntryStatus {
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn entry_status(self) -> ApprovalEntryStatus {
        match self {
            Self::Approve => ApprovalEntryStatus::Approved,
            Self::Reject => ApprovalEntryStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub user_id: UserId,
    pub status: ApprovalEntryStatus,
}

/// Amount in the company base currency, fixed when the draft is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedAmount {
    pub amount: Decimal,
    pub currency: String,
    pub rate: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub owner_id: UserId,
    pub description: String,
    pub category: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub converted: ConvertedAmount,
    pub paid_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_name: Option<String>,
    pub status: ExpenseStatus,
    pub approver_ids: Vec<UserId>,
    pub approvals: Vec<ApprovalEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ApprovalPolicy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn entry_for(&self, user_id: &UserId) -> Option<&ApprovalEntry> {
        self.approvals.iter().find(|entry| &entry.user_id == user_id)
    }

    pub fn is_pending_for(&self, user_id: &UserId) -> bool {
        self.status.awaits_decision()
            && self
                .entry_for(user_id)
                .is_some_and(|entry| entry.status == ApprovalEntryStatus::Pending)
    }
}

/// Caller-supplied fields for a new draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub paid_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub receipt_name: Option<String>,
}
