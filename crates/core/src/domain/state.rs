use serde::{Deserialize, Serialize};

use crate::approvals::UserDirectory;
use crate::domain::company::Company;
use crate::domain::expense::{Expense, ExpenseId};
use crate::domain::rule::Rule;
use crate::domain::user::{User, UserId};

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// Everything the engine persists, loaded and saved as one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub rule: Rule,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

impl AggregateState {
    pub fn base_currency(&self) -> &str {
        self.company
            .as_ref()
            .map(|company| company.base_currency.as_str())
            .unwrap_or(DEFAULT_BASE_CURRENCY)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|user| &user.id == id)
    }

    pub fn expense(&self, id: &ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|expense| &expense.id == id)
    }

    pub fn expense_mut(&mut self, id: &ExpenseId) -> Option<&mut Expense> {
        self.expenses.iter_mut().find(|expense| &expense.id == id)
    }

    pub fn email_taken(&self, email: &str) -> bool {
        let email = email.trim();
        self.users.iter().any(|user| user.email.eq_ignore_ascii_case(email))
    }
}

impl UserDirectory for AggregateState {
    fn user(&self, id: &UserId) -> Option<&User> {
        self.users.as_slice().user(id)
    }

    fn manages_anyone(&self, id: &UserId) -> bool {
        self.users.as_slice().manages_anyone(id)
    }
}

#[cfg(test)]
mod tests {
    use super::AggregateState;
    use crate::domain::company::{Company, CompanyId};

    #[test]
    fn base_currency_falls_back_to_usd_without_company() {
        assert_eq!(AggregateState::default().base_currency(), "USD");
    }

    #[test]
    fn base_currency_comes_from_company() {
        let state = AggregateState {
            company: Some(Company {
                id: CompanyId("c-1".to_string()),
                name: "Acme".to_string(),
                country: "India".to_string(),
                base_currency: "INR".to_string(),
            }),
            ..AggregateState::default()
        };
        assert_eq!(state.base_currency(), "INR");
    }

    #[test]
    fn empty_payload_decodes_to_default_state() {
        let state: AggregateState = serde_json::from_str("{}").expect("decode empty state");
        assert_eq!(state, AggregateState::default());
        assert_eq!(state.rule.min_percent, 60);
    }
}
