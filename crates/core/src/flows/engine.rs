use crate::approvals::{resolve_approvers, UserDirectory};
use crate::domain::expense::{
    ApprovalEntry, ApprovalEntryStatus, Decision, Expense, ExpenseStatus,
};
use crate::domain::rule::{ApprovalPolicy, Rule};
use crate::domain::user::UserId;
use crate::errors::DomainError;
use crate::flows::states::{FlowEvent, FlowMode, TransitionOutcome};

/// How a ledger opens, how a decision moves it on, and how it settles.
pub trait ApprovalFlow {
    fn mode(&self) -> FlowMode;

    fn initial_entry_status(&self, position: usize) -> ApprovalEntryStatus;

    /// Runs after one entry has been decided; returns the approver whose turn begins.
    fn after_decision(&self, ledger: &mut [ApprovalEntry], decision: Decision) -> Option<UserId>;

    /// Mode-specific outcome. The empty-ledger and specific-approver checks run before this.
    fn settle(&self, ledger: &[ApprovalEntry], policy: &ApprovalPolicy) -> ExpenseStatus;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialFlow;

impl ApprovalFlow for SequentialFlow {
    fn mode(&self) -> FlowMode {
        FlowMode::Sequential
    }

    fn initial_entry_status(&self, position: usize) -> ApprovalEntryStatus {
        if position == 0 {
            ApprovalEntryStatus::Pending
        } else {
            ApprovalEntryStatus::Blocked
        }
    }

    fn after_decision(&self, ledger: &mut [ApprovalEntry], decision: Decision) -> Option<UserId> {
        if decision != Decision::Approve {
            return None;
        }

        let next = ledger.iter_mut().find(|entry| entry.status == ApprovalEntryStatus::Blocked)?;
        next.status = ApprovalEntryStatus::Pending;
        Some(next.user_id.clone())
    }

    fn settle(&self, ledger: &[ApprovalEntry], _policy: &ApprovalPolicy) -> ExpenseStatus {
        if ledger.iter().any(|entry| entry.status == ApprovalEntryStatus::Rejected) {
            return ExpenseStatus::Rejected;
        }

        if ledger.iter().all(|entry| entry.status == ApprovalEntryStatus::Approved) {
            return ExpenseStatus::Approved;
        }

        ExpenseStatus::InReview
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PercentageFlow;

impl ApprovalFlow for PercentageFlow {
    fn mode(&self) -> FlowMode {
        FlowMode::Percentage
    }

    fn initial_entry_status(&self, _position: usize) -> ApprovalEntryStatus {
        ApprovalEntryStatus::Pending
    }

    fn after_decision(&self, _ledger: &mut [ApprovalEntry], _decision: Decision) -> Option<UserId> {
        None
    }

    fn settle(&self, ledger: &[ApprovalEntry], policy: &ApprovalPolicy) -> ExpenseStatus {
        let required = &policy.required_approver_ids;

        let vetoed = ledger.iter().any(|entry| {
            entry.status == ApprovalEntryStatus::Rejected && required.contains(&entry.user_id)
        });
        if vetoed {
            return ExpenseStatus::Rejected;
        }

        let approved = count(ledger, |status| status == ApprovalEntryStatus::Approved);
        let undecided = count(ledger, |status| !status.is_decided());
        let required_count = required_approvals(policy.min_percent, ledger.len());

        let all_required_approved = required.iter().all(|required_id| {
            ledger.iter().any(|entry| {
                &entry.user_id == required_id && entry.status == ApprovalEntryStatus::Approved
            })
        });

        if all_required_approved && approved >= required_count {
            return ExpenseStatus::Approved;
        }

        if approved + undecided < required_count {
            return ExpenseStatus::Rejected;
        }

        ExpenseStatus::InReview
    }
}

/// `ceil(min_percent / 100 * total)` without floating point.
pub fn required_approvals(min_percent: u8, total: usize) -> usize {
    (usize::from(min_percent) * total).div_ceil(100)
}

/// Derives the status a ledger implies under `policy`. Pure: same input, same answer.
pub fn evaluate(ledger: &[ApprovalEntry], policy: &ApprovalPolicy) -> ExpenseStatus {
    if ledger.is_empty() {
        return ExpenseStatus::Approved;
    }

    let specific_approver_approved = policy.specific_approver_ids.iter().any(|approver_id| {
        ledger.iter().any(|entry| {
            &entry.user_id == approver_id && entry.status == ApprovalEntryStatus::Approved
        })
    });
    if specific_approver_approved {
        return ExpenseStatus::Approved;
    }

    flow_for(policy).settle(ledger, policy)
}

fn flow_for(policy: &ApprovalPolicy) -> &'static dyn ApprovalFlow {
    if policy.sequential {
        &SequentialFlow
    } else {
        &PercentageFlow
    }
}

fn count(ledger: &[ApprovalEntry], predicate: impl Fn(ApprovalEntryStatus) -> bool) -> usize {
    ledger.iter().filter(|entry| predicate(entry.status)).count()
}

/// Lifecycle driver for a single expense: `draft -> submitted -> in_review -> approved|rejected`.
///
/// Every method either applies its whole transition or returns an error with the expense
/// left untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApprovalEngine;

impl ApprovalEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn submit<D>(
        &self,
        expense: &mut Expense,
        rule: &Rule,
        directory: &D,
    ) -> Result<TransitionOutcome, DomainError>
    where
        D: UserDirectory + ?Sized,
    {
        if expense.status != ExpenseStatus::Draft {
            return Err(DomainError::invalid_state(
                "expense",
                &expense.id,
                format!("only drafts can be submitted, expense is {}", expense.status),
            ));
        }

        let from = expense.status;
        let approver_ids = resolve_approvers(rule, &expense.owner_id, directory);
        let policy = rule.policy_for(&approver_ids);
        let flow = flow_for(&policy);

        expense.status = ExpenseStatus::Submitted;
        expense.approvals = approver_ids
            .iter()
            .enumerate()
            .map(|(position, user_id)| ApprovalEntry {
                user_id: user_id.clone(),
                status: flow.initial_entry_status(position),
            })
            .collect();
        expense.approver_ids = approver_ids.clone();
        expense.status = if expense.approvals.is_empty() {
            ExpenseStatus::Approved
        } else {
            match evaluate(&expense.approvals, &policy) {
                ExpenseStatus::Approved => ExpenseStatus::Approved,
                ExpenseStatus::Rejected => ExpenseStatus::Rejected,
                _ => ExpenseStatus::InReview,
            }
        };
        expense.policy = Some(policy);

        Ok(TransitionOutcome {
            expense_id: expense.id.clone(),
            from,
            to: expense.status,
            mode: flow.mode(),
            event: FlowEvent::Submitted { approver_ids },
            unblocked: None,
        })
    }

    pub fn act(
        &self,
        expense: &mut Expense,
        approver_id: &UserId,
        decision: Decision,
    ) -> Result<TransitionOutcome, DomainError> {
        if !expense.status.awaits_decision() {
            return Err(DomainError::invalid_state(
                "expense",
                &expense.id,
                format!("expense is {}, no decisions are accepted", expense.status),
            ));
        }

        let policy = expense.policy.clone().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "expense `{}` is awaiting approval without an approval policy",
                expense.id
            ))
        })?;

        let not_authorized = |reason: &str| DomainError::NotAuthorized {
            approver_id: approver_id.to_string(),
            expense_id: expense.id.to_string(),
            reason: reason.to_string(),
        };

        let Some(position) =
            expense.approvals.iter().position(|entry| &entry.user_id == approver_id)
        else {
            return Err(not_authorized("not an assigned approver"));
        };

        match expense.approvals[position].status {
            ApprovalEntryStatus::Pending => {}
            ApprovalEntryStatus::Blocked => {
                return Err(not_authorized("waiting for an earlier approver to decide"));
            }
            ApprovalEntryStatus::Approved | ApprovalEntryStatus::Rejected => {
                return Err(DomainError::invalid_state(
                    "expense",
                    &expense.id,
                    format!("approver `{approver_id}` has already decided"),
                ));
            }
        }

        let from = expense.status;
        expense.approvals[position].status = decision.entry_status();
        let flow = flow_for(&policy);
        let unblocked = flow.after_decision(&mut expense.approvals, decision);
        expense.status = evaluate(&expense.approvals, &policy);

        Ok(TransitionOutcome {
            expense_id: expense.id.clone(),
            from,
            to: expense.status,
            mode: flow.mode(),
            event: FlowEvent::DecisionRecorded { approver_id: approver_id.clone(), decision },
            unblocked,
        })
    }

    /// Re-derives the status of a submitted expense from its ledger. Drafts are left alone.
    pub fn reevaluate(&self, expense: &mut Expense) -> ExpenseStatus {
        if let Some(policy) = &expense.policy {
            if expense.status != ExpenseStatus::Draft {
                expense.status = evaluate(&expense.approvals, policy);
            }
        }
        expense.status
    }
}
