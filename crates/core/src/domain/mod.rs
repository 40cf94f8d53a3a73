pub mod company;
pub mod expense;
pub mod rule;
pub mod state;
pub mod user;

pub use company::{Company, CompanyId, NewCompany};
pub use expense::{
    ApprovalEntry, ApprovalEntryStatus, ConvertedAmount, Decision, Expense, ExpenseId,
    ExpenseStatus, NewExpense,
};
pub use rule::{ApprovalPolicy, Rule};
pub use state::AggregateState;
pub use user::{NewUser, Role, User, UserId};
