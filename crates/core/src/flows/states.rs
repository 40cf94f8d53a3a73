use serde::{Deserialize, Serialize};

use crate::domain::expense::{Decision, ExpenseId, ExpenseStatus};
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    Sequential,
    Percentage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowEvent {
    Submitted { approver_ids: Vec<UserId> },
    DecisionRecorded { approver_id: UserId, decision: Decision },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub expense_id: ExpenseId,
    pub from: ExpenseStatus,
    pub to: ExpenseStatus,
    pub mode: FlowMode,
    pub event: FlowEvent,
    /// Sequential flows hand the turn to this approver after an approval.
    pub unblocked: Option<UserId>,
}

impl TransitionOutcome {
    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }
}
