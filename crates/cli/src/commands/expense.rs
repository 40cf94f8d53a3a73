use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;

use expensa_core::domain::expense::{Decision, ExpenseId, NewExpense};
use expensa_core::domain::user::UserId;

use crate::commands::{with_store, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct DraftArgs {
    #[arg(long, help = "Id of the employee filing the expense")]
    pub owner: String,
    #[arg(long)]
    pub description: String,
    #[arg(long, help = "Amount in the original currency, e.g. 42.50")]
    pub amount: Decimal,
    #[arg(long, help = "ISO currency code of the amount")]
    pub currency: String,
    #[arg(long, help = "Expense date (YYYY-MM-DD)")]
    pub date: NaiveDate,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub paid_by: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
    #[arg(long, help = "Receipt file name; the file itself is not stored")]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct IdArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct DecisionArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long, help = "Id of the approver acting on the expense")]
    pub approver: String,
}

#[derive(Debug, Clone, Args)]
pub struct OwnerArgs {
    #[arg(long)]
    pub owner: String,
}

#[derive(Debug, Clone, Args)]
pub struct PendingArgs {
    #[arg(long, help = "Approver whose queue to list")]
    pub user: String,
}

pub fn draft(args: DraftArgs) -> CommandResult {
    with_store("expense draft", |store| async move {
        let fields = NewExpense {
            description: args.description,
            category: args.category,
            date: args.date,
            amount: args.amount,
            currency: args.currency,
            paid_by: args.paid_by,
            note: args.note,
            receipt_name: args.receipt,
        };
        let expense = store.create_expense_draft(&UserId(args.owner), fields).await?;
        let message = format!(
            "drafted expense `{}` ({} {} = {} {})",
            expense.id,
            expense.amount,
            expense.currency,
            expense.converted.amount,
            expense.converted.currency
        );
        Ok((message, expense))
    })
}

pub fn submit(args: IdArgs) -> CommandResult {
    with_store("expense submit", |store| async move {
        let expense = store.submit_expense(&ExpenseId(args.id)).await?;
        let message = format!(
            "submitted expense `{}` to {} approvers, status {}",
            expense.id,
            expense.approver_ids.len(),
            expense.status
        );
        Ok((message, expense))
    })
}

pub fn approve(args: DecisionArgs) -> CommandResult {
    decide("expense approve", args, Decision::Approve)
}

pub fn reject(args: DecisionArgs) -> CommandResult {
    decide("expense reject", args, Decision::Reject)
}

fn decide(command: &'static str, args: DecisionArgs, decision: Decision) -> CommandResult {
    with_store(command, move |store| async move {
        let expense = store
            .act_on_approval(&ExpenseId(args.id), &UserId(args.approver), decision)
            .await?;
        Ok((format!("expense `{}` is now {}", expense.id, expense.status), expense))
    })
}

pub fn show(args: IdArgs) -> CommandResult {
    with_store("expense show", |store| async move {
        let expense = store.expense(&ExpenseId(args.id)).await?;
        Ok((format!("expense `{}` is {}", expense.id, expense.status), expense))
    })
}

pub fn mine(args: OwnerArgs) -> CommandResult {
    with_store("expense mine", |store| async move {
        let expenses = store.my_expenses(&UserId(args.owner)).await?;
        Ok((format!("{} expenses", expenses.len()), expenses))
    })
}

pub fn pending(args: PendingArgs) -> CommandResult {
    with_store("expense pending", |store| async move {
        let pending = store.pending_approvals_for(&UserId(args.user)).await?;
        Ok((format!("{} expenses awaiting decision", pending.len()), pending))
    })
}

pub fn summary(args: OwnerArgs) -> CommandResult {
    with_store("expense summary", |store| async move {
        let summary = store.expense_summary(&UserId(args.owner)).await?;
        let message = format!(
            "to submit {0} {3}, waiting {1} {3}, approved {2} {3}",
            summary.to_submit, summary.waiting_approval, summary.approved, summary.currency
        );
        Ok((message, summary))
    })
}
