pub mod approvals;
pub mod config;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod store;

pub use approvals::{resolve_approvers, UserDirectory};
pub use currency::RateTable;
pub use domain::company::{Company, CompanyId, NewCompany};
pub use domain::expense::{
    ApprovalEntry, ApprovalEntryStatus, ConvertedAmount, Decision, Expense, ExpenseId,
    ExpenseStatus, NewExpense,
};
pub use domain::rule::{ApprovalPolicy, Rule};
pub use domain::state::AggregateState;
pub use domain::user::{NewUser, Role, User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ApprovalEngine, TransitionOutcome};
pub use store::{ExpenseStore, ExpenseSummary, PendingApproval, StateStore};
