//! The application surface over one persisted [`AggregateState`].
//!
//! Every mutation is a single read-modify-write performed under an async mutex: the state is
//! loaded, changed in memory and saved whole. A mutation whose domain check fails is never
//! saved, so callers observe either the full change or none of it.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::approvals::UserDirectory;
use crate::currency::{normalize_code, RateTable};
use crate::domain::company::{Company, CompanyId, NewCompany};
use crate::domain::expense::{Decision, Expense, ExpenseId, ExpenseStatus, NewExpense};
use crate::domain::rule::Rule;
use crate::domain::state::AggregateState;
use crate::domain::user::{NewUser, Role, User, UserId};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::ApprovalEngine;

pub const DEFAULT_CATEGORY: &str = "Misc";
pub const DEFAULT_PAID_BY: &str = "Me";
pub const UNKNOWN_OWNER_NAME: &str = "Unknown";

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_state(&self) -> Result<AggregateState, ApplicationError>;
    async fn save_state(&self, state: &AggregateState) -> Result<(), ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub expense: Expense,
    pub owner_name: String,
}

/// Converted totals for one owner, in the company base currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub currency: String,
    pub to_submit: Decimal,
    pub waiting_approval: Decimal,
    pub approved: Decimal,
}

pub struct ExpenseStore<S> {
    store: S,
    rates: RateTable,
    engine: ApprovalEngine,
    write_lock: Mutex<()>,
}

impl<S> ExpenseStore<S>
where
    S: StateStore,
{
    pub fn new(store: S) -> Self {
        Self::with_rates(store, RateTable::default())
    }

    pub fn with_rates(store: S, rates: RateTable) -> Self {
        Self { store, rates, engine: ApprovalEngine::new(), write_lock: Mutex::new(()) }
    }

    pub fn state_store(&self) -> &S {
        &self.store
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub async fn create_company_and_admin(
        &self,
        company: NewCompany,
        admin: NewUser,
    ) -> Result<(Company, User), ApplicationError> {
        let rates = &self.rates;
        let (company, admin) = self
            .mutate("company.create", move |state| {
                if let Some(existing) = &state.company {
                    return Err(DomainError::invalid_state(
                        "company",
                        &existing.id,
                        "a company has already been set up",
                    ));
                }

                let name = required_text("company name", &company.name)?;
                let base_currency = normalize_code(&company.base_currency);
                rates.rate(&base_currency)?;
                let admin = new_user(state, admin, Role::Admin)?;

                let company = Company {
                    id: CompanyId::generate(),
                    name,
                    country: company.country.trim().to_string(),
                    base_currency,
                };
                state.company = Some(company.clone());
                state.users.push(admin.clone());
                Ok((company, admin))
            })
            .await?;

        info!(
            event_name = "company.created",
            company_id = %company.id,
            admin_id = %admin.id,
            base_currency = %company.base_currency,
            "company and admin created"
        );
        Ok((company, admin))
    }

    pub async fn company(&self) -> Result<Option<Company>, ApplicationError> {
        Ok(self.store.load_state().await?.company)
    }

    pub async fn base_currency(&self) -> Result<String, ApplicationError> {
        Ok(self.store.load_state().await?.base_currency().to_string())
    }

    pub async fn add_user(&self, user: NewUser) -> Result<User, ApplicationError> {
        let role = user.role;
        let user = self
            .mutate("user.add", move |state| {
                let user = new_user(state, user, role)?;
                state.users.push(user.clone());
                Ok(user)
            })
            .await?;

        info!(
            event_name = "user.added",
            user_id = %user.id,
            role = %user.role,
            manager_id = user.manager_id.as_ref().map(UserId::as_str).unwrap_or("none"),
            "user added"
        );
        Ok(user)
    }

    pub async fn update_user_role(
        &self,
        user_id: &UserId,
        role: Role,
    ) -> Result<User, ApplicationError> {
        let user = self
            .mutate("user.update_role", |state| {
                let user =
                    state.user_mut(user_id).ok_or_else(|| DomainError::not_found("user", user_id))?;
                user.role = role;
                Ok(user.clone())
            })
            .await?;

        info!(
            event_name = "user.role_updated",
            user_id = %user.id,
            role = %user.role,
            "user role updated"
        );
        Ok(user)
    }

    /// Points `user_id` at `manager_id`, or clears the link when `manager_id` is `None`.
    pub async fn set_manager(
        &self,
        user_id: &UserId,
        manager_id: Option<&UserId>,
    ) -> Result<User, ApplicationError> {
        let user = self
            .mutate("user.set_manager", |state| {
                if let Some(manager_id) = manager_id {
                    if manager_id == user_id {
                        return Err(DomainError::InvariantViolation(format!(
                            "user `{user_id}` cannot be their own manager"
                        )));
                    }
                    if state.user(manager_id).is_none() {
                        return Err(DomainError::not_found("user", manager_id));
                    }
                }

                let user =
                    state.user_mut(user_id).ok_or_else(|| DomainError::not_found("user", user_id))?;
                user.manager_id = manager_id.cloned();
                Ok(user.clone())
            })
            .await?;

        info!(
            event_name = "user.manager_set",
            user_id = %user.id,
            manager_id = user.manager_id.as_ref().map(UserId::as_str).unwrap_or("none"),
            "manager updated"
        );
        Ok(user)
    }

    pub async fn users(&self) -> Result<Vec<User>, ApplicationError> {
        Ok(self.store.load_state().await?.users)
    }

    pub async fn user(&self, user_id: &UserId) -> Result<User, ApplicationError> {
        let state = self.store.load_state().await?;
        state.user(user_id).cloned().ok_or_else(|| DomainError::not_found("user", user_id).into())
    }

    pub async fn rules(&self) -> Result<Rule, ApplicationError> {
        Ok(self.store.load_state().await?.rule)
    }

    /// Replaces the active rule. Expenses already submitted keep the policy they were given.
    pub async fn save_rules(&self, rule: Rule) -> Result<Rule, ApplicationError> {
        let rule = self
            .mutate("rules.save", move |state| {
                rule.validate(&*state)?;
                state.rule = rule.clone();
                Ok(rule)
            })
            .await?;

        info!(
            event_name = "rules.saved",
            rule_name = %rule.name,
            sequential = rule.sequential,
            min_percent = rule.min_percent,
            "approval rule saved"
        );
        Ok(rule)
    }

    pub async fn create_expense_draft(
        &self,
        owner_id: &UserId,
        fields: NewExpense,
    ) -> Result<Expense, ApplicationError> {
        let rates = &self.rates;
        let expense = self
            .mutate("expense.create_draft", move |state| {
                if state.user(owner_id).is_none() {
                    return Err(DomainError::not_found("user", owner_id));
                }

                let description = required_text("expense description", &fields.description)?;
                if fields.amount <= Decimal::ZERO {
                    return Err(DomainError::InvariantViolation(format!(
                        "expense amount must be greater than zero, got {}",
                        fields.amount
                    )));
                }

                let currency = normalize_code(&fields.currency);
                let converted = rates.convert(fields.amount, &currency, state.base_currency())?;
                let now = Utc::now();

                let expense = Expense {
                    id: ExpenseId::generate(),
                    owner_id: owner_id.clone(),
                    description,
                    category: text_or(fields.category, DEFAULT_CATEGORY),
                    date: fields.date,
                    amount: fields.amount,
                    currency,
                    converted,
                    paid_by: text_or(fields.paid_by, DEFAULT_PAID_BY),
                    note: fields.note.filter(|note| !note.trim().is_empty()),
                    receipt_name: fields.receipt_name.filter(|name| !name.trim().is_empty()),
                    status: ExpenseStatus::Draft,
                    approver_ids: Vec::new(),
                    approvals: Vec::new(),
                    policy: None,
                    created_at: now,
                    updated_at: now,
                };
                state.expenses.push(expense.clone());
                Ok(expense)
            })
            .await?;

        info!(
            event_name = "expense.draft_created",
            expense_id = %expense.id,
            owner_id = %expense.owner_id,
            amount = %expense.amount,
            currency = %expense.currency,
            "expense draft created"
        );
        Ok(expense)
    }

    pub async fn submit_expense(&self, expense_id: &ExpenseId) -> Result<Expense, ApplicationError> {
        let engine = self.engine;
        let (expense, outcome) = self
            .mutate("expense.submit", |state| {
                let AggregateState { users, rule, expenses, .. } = state;
                let expense = expenses
                    .iter_mut()
                    .find(|expense| &expense.id == expense_id)
                    .ok_or_else(|| DomainError::not_found("expense", expense_id))?;

                let outcome = engine.submit(expense, rule, users.as_slice())?;
                expense.updated_at = Utc::now();
                Ok((expense.clone(), outcome))
            })
            .await?;

        info!(
            event_name = "expense.submitted",
            expense_id = %expense.id,
            from = %outcome.from,
            to = %outcome.to,
            flow = ?outcome.mode,
            approvers = expense.approver_ids.len(),
            "expense submitted"
        );
        Ok(expense)
    }

    pub async fn act_on_approval(
        &self,
        expense_id: &ExpenseId,
        approver_id: &UserId,
        decision: Decision,
    ) -> Result<Expense, ApplicationError> {
        let engine = self.engine;
        let (expense, outcome) = self
            .mutate("expense.decide", |state| {
                if state.user(approver_id).is_none() {
                    return Err(DomainError::not_found("user", approver_id));
                }

                let expense = state
                    .expense_mut(expense_id)
                    .ok_or_else(|| DomainError::not_found("expense", expense_id))?;
                let outcome = engine.act(expense, approver_id, decision)?;
                expense.updated_at = Utc::now();
                Ok((expense.clone(), outcome))
            })
            .await?;

        info!(
            event_name = "expense.decision_recorded",
            expense_id = %expense.id,
            approver_id = %approver_id,
            decision = ?decision,
            from = %outcome.from,
            to = %outcome.to,
            terminal = outcome.is_terminal(),
            unblocked = outcome.unblocked.as_ref().map(UserId::as_str).unwrap_or("none"),
            "approval decision recorded"
        );
        Ok(expense)
    }

    pub async fn expense(&self, expense_id: &ExpenseId) -> Result<Expense, ApplicationError> {
        let state = self.store.load_state().await?;
        state
            .expense(expense_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("expense", expense_id).into())
    }

    /// Expenses owned by `owner_id`, newest `date` first.
    pub async fn my_expenses(&self, owner_id: &UserId) -> Result<Vec<Expense>, ApplicationError> {
        let state = self.store.load_state().await?;
        if state.user(owner_id).is_none() {
            return Err(DomainError::not_found("user", owner_id).into());
        }

        let mut expenses: Vec<Expense> = state
            .expenses
            .into_iter()
            .filter(|expense| &expense.owner_id == owner_id)
            .collect();
        expenses.sort_by(|left, right| right.date.cmp(&left.date));
        Ok(expenses)
    }

    /// Expenses waiting on a decision from `user_id` right now.
    pub async fn pending_approvals_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PendingApproval>, ApplicationError> {
        let state = self.store.load_state().await?;
        if state.user(user_id).is_none() {
            return Err(DomainError::not_found("user", user_id).into());
        }

        Ok(state
            .expenses
            .iter()
            .filter(|expense| expense.is_pending_for(user_id))
            .map(|expense| PendingApproval {
                owner_name: state
                    .user(&expense.owner_id)
                    .map(|owner| owner.name.clone())
                    .unwrap_or_else(|| UNKNOWN_OWNER_NAME.to_string()),
                expense: expense.clone(),
            })
            .collect())
    }

    /// Totals of `owner_id`'s expenses in the company base currency, bucketed by status.
    pub async fn expense_summary(
        &self,
        owner_id: &UserId,
    ) -> Result<ExpenseSummary, ApplicationError> {
        let expenses = self.my_expenses(owner_id).await?;
        let currency = self.base_currency().await?;
        let mut summary = ExpenseSummary {
            currency: currency.clone(),
            to_submit: Decimal::ZERO,
            waiting_approval: Decimal::ZERO,
            approved: Decimal::ZERO,
        };

        for expense in &expenses {
            // Drafts created before the company existed hold a fallback-currency figure;
            // convert those from the entered amount so the total is rounded once.
            let amount = if expense.converted.currency == currency {
                expense.converted.amount
            } else {
                self.rates.convert(expense.amount, &expense.currency, &currency)?.amount
            };

            match expense.status {
                ExpenseStatus::Draft => summary.to_submit += amount,
                ExpenseStatus::Submitted | ExpenseStatus::InReview => {
                    summary.waiting_approval += amount
                }
                ExpenseStatus::Approved => summary.approved += amount,
                ExpenseStatus::Rejected => {}
            }
        }

        Ok(summary)
    }

    async fn mutate<T, F>(&self, operation: &'static str, apply: F) -> Result<T, ApplicationError>
    where
        F: FnOnce(&mut AggregateState) -> Result<T, DomainError> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut state = self.store.load_state().await?;

        match apply(&mut state) {
            Ok(value) => {
                self.store.save_state(&state).await?;
                Ok(value)
            }
            Err(error) => {
                warn!(
                    event_name = "store.mutation_rejected",
                    operation,
                    error_class = error.error_class(),
                    error = %error,
                    "state mutation rejected"
                );
                Err(error.into())
            }
        }
    }
}

fn new_user(state: &AggregateState, user: NewUser, role: Role) -> Result<User, DomainError> {
    let name = required_text("user name", &user.name)?;
    let email = required_text("user email", &user.email)?;
    if !email.contains('@') {
        return Err(DomainError::InvariantViolation(format!("`{email}` is not an email address")));
    }
    if state.email_taken(&email) {
        return Err(DomainError::InvariantViolation(format!(
            "email `{email}` is already registered"
        )));
    }

    if let Some(manager_id) = &user.manager_id {
        if state.user(manager_id).is_none() {
            return Err(DomainError::not_found("user", manager_id));
        }
    }

    Ok(User { id: UserId::generate(), name, email, role, manager_id: user.manager_id })
}

fn required_text(field: &str, value: &str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::InvariantViolation(format!("{field} must not be blank")));
    }
    Ok(value.to_string())
}

fn text_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
