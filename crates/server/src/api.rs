//! JSON API over the expense store.
//!
//! - `POST /company`: create the company and its first admin
//! - `GET  /users`, `POST /users`: list or add users
//! - `PUT  /users/{id}/role`: change a user's role
//! - `PUT  /users/{id}/manager`: set or clear a reporting line
//! - `GET  /rules`, `PUT /rules`: read or replace the approval rule
//! - `POST /expenses`: create a draft
//! - `GET  /expenses/{id}`: fetch one expense
//! - `POST /expenses/{id}/submit`: send a draft into approval
//! - `POST /expenses/{id}/decision`: approve or reject as an assigned approver
//! - `GET  /users/{id}/expenses`: expenses owned by a user, newest first
//! - `GET  /users/{id}/expenses/summary`: converted totals per status
//! - `GET  /users/{id}/approvals`: expenses waiting on the user's decision

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use expensa_core::domain::company::{Company, NewCompany};
use expensa_core::domain::expense::{Decision, Expense, ExpenseId, NewExpense};
use expensa_core::domain::rule::Rule;
use expensa_core::domain::user::{NewUser, Role, User, UserId};
use expensa_core::errors::{ApplicationError, InterfaceError};
use expensa_core::store::{ExpenseStore, ExpenseSummary, PendingApproval};
use expensa_db::SqlStateStore;

pub type SharedStore = Arc<ExpenseStore<SqlStateStore>>;

#[derive(Clone)]
pub struct ApiState {
    store: SharedStore,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub country: String,
    pub base_currency: String,
    pub admin_name: String,
    pub admin_email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateCompanyResponse {
    pub company: Company,
    pub admin: User,
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default = "employee")]
    pub role: Role,
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

fn employee() -> Role {
    Role::Employee
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ManagerRequest {
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub owner_id: UserId,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub paid_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub receipt_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approver_id: UserId,
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// Store failure rendered as a JSON error with a fresh correlation id.
#[derive(Debug)]
pub struct ApiError {
    class: &'static str,
    error: InterfaceError,
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let class = error.error_class();
        Self { class, error: error.into_interface(Uuid::new_v4().to_string()) }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                event_name = "api.request_failed",
                correlation_id = %self.error.correlation_id(),
                error_class = self.class,
                error = %self.error,
                "request failed"
            );
        } else {
            warn!(
                event_name = "api.request_rejected",
                correlation_id = %self.error.correlation_id(),
                error_class = self.class,
                error = %self.error,
                "request rejected"
            );
        }

        let body = ErrorBody {
            error: self.class,
            message: self.error.user_message(),
            detail: self.error.message().to_string(),
            correlation_id: self.error.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/company", post(create_company))
        .route("/users", get(list_users).post(add_user))
        .route("/users/{id}/role", put(update_role))
        .route("/users/{id}/manager", put(set_manager))
        .route("/users/{id}/expenses", get(my_expenses))
        .route("/users/{id}/expenses/summary", get(expense_summary))
        .route("/users/{id}/approvals", get(pending_approvals))
        .route("/rules", get(get_rules).put(save_rules))
        .route("/expenses", post(create_expense))
        .route("/expenses/{id}", get(get_expense))
        .route("/expenses/{id}/submit", post(submit_expense))
        .route("/expenses/{id}/decision", post(decide_expense))
        .with_state(ApiState { store })
}

async fn create_company(
    State(state): State<ApiState>,
    Json(body): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<CreateCompanyResponse>), ApiError> {
    let (company, admin) = state
        .store
        .create_company_and_admin(
            NewCompany {
                name: body.name,
                country: body.country,
                base_currency: body.base_currency,
            },
            NewUser {
                name: body.admin_name,
                email: body.admin_email,
                role: Role::Admin,
                manager_id: None,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CreateCompanyResponse { company, admin })))
}

async fn list_users(State(state): State<ApiState>) -> ApiResult<Vec<User>> {
    Ok(Json(state.store.users().await?))
}

async fn add_user(
    State(state): State<ApiState>,
    Json(body): Json<AddUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .store
        .add_user(NewUser {
            name: body.name,
            email: body.email,
            role: body.role,
            manager_id: body.manager_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_role(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<RoleRequest>,
) -> ApiResult<User> {
    Ok(Json(state.store.update_user_role(&UserId(id), body.role).await?))
}

async fn set_manager(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<ManagerRequest>,
) -> ApiResult<User> {
    Ok(Json(state.store.set_manager(&UserId(id), body.manager_id.as_ref()).await?))
}

async fn get_rules(State(state): State<ApiState>) -> ApiResult<Rule> {
    Ok(Json(state.store.rules().await?))
}

async fn save_rules(State(state): State<ApiState>, Json(rule): Json<Rule>) -> ApiResult<Rule> {
    Ok(Json(state.store.save_rules(rule).await?))
}

async fn create_expense(
    State(state): State<ApiState>,
    Json(body): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let fields = NewExpense {
        description: body.description,
        category: body.category,
        date: body.date,
        amount: body.amount,
        currency: body.currency,
        paid_by: body.paid_by,
        note: body.note,
        receipt_name: body.receipt_name,
    };
    let expense = state.store.create_expense_draft(&body.owner_id, fields).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn get_expense(Path(id): Path<String>, State(state): State<ApiState>) -> ApiResult<Expense> {
    Ok(Json(state.store.expense(&ExpenseId(id)).await?))
}

async fn submit_expense(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Expense> {
    Ok(Json(state.store.submit_expense(&ExpenseId(id)).await?))
}

async fn decide_expense(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<DecisionRequest>,
) -> ApiResult<Expense> {
    let expense =
        state.store.act_on_approval(&ExpenseId(id), &body.approver_id, body.decision).await?;
    Ok(Json(expense))
}

async fn my_expenses(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Vec<Expense>> {
    Ok(Json(state.store.my_expenses(&UserId(id)).await?))
}

async fn expense_summary(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<ExpenseSummary> {
    Ok(Json(state.store.expense_summary(&UserId(id)).await?))
}

async fn pending_approvals(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Vec<PendingApproval>> {
    Ok(Json(state.store.pending_approvals_for(&UserId(id)).await?))
}
