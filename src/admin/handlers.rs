use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::{
    analytics::{CategoryTotal, IncomeExpenseTotals, MonthCount, TopSpender},
    dto::{
        AdminMessage, AllUserExpenses, AverageExpense, ByCategoryResponse, ByDateResponse,
        ExpenseTotals, NetAmount, UpdateRoleRequest, UserCounts, UserUpdatedResponse,
    },
    services::{self, Analytics},
};
use crate::{
    auth::{dto::PublicUser, extractors::AdminUser},
    error::AppError,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/all-expenses", get(all_user_expenses))
        .route(
            "/api/admin/users/:user_id",
            patch(update_user_role).delete(deactivate_user),
        )
        .route("/api/admin/analytics", get(user_counts))
        .route("/api/admin/total-expenses", get(expense_totals))
        .route("/api/admin/net", get(net_amount))
        .route("/api/admin/income-expense", get(income_expense))
        .route("/api/admin/by-date", get(by_date))
        .route("/api/admin/by-category", get(by_category))
        .route("/api/admin/expense-categories", get(category_totals))
        .route("/api/admin/active-users-trend", get(active_users_trend))
        .route("/api/admin/top-spenders", get(top_spenders))
        .route("/api/admin/average-expense", get(average_expense))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = services::list_users(state.store.as_ref()).await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateRoleRequest>, AppError>,
) -> Result<Json<UserUpdatedResponse>, AppError> {
    let user =
        services::update_user_role(state.store.as_ref(), admin.id, user_id, payload.role_id)
            .await?;
    Ok(Json(UserUpdatedResponse {
        message: "User role updated successfully".into(),
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, admin))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<Json<AdminMessage>, AppError> {
    services::deactivate_user(state.store.as_ref(), admin.id, user_id).await?;
    Ok(Json(AdminMessage {
        message: "User deactivated successfully".into(),
    }))
}

#[instrument(skip(state, _admin))]
pub async fn user_counts(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<UserCounts>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).user_counts().await?))
}

#[instrument(skip(state, _admin))]
pub async fn expense_totals(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ExpenseTotals>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).expense_totals().await?))
}

#[instrument(skip(state, _admin))]
pub async fn net_amount(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<NetAmount>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).net_amount().await?))
}

#[instrument(skip(state, _admin))]
pub async fn income_expense(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<IncomeExpenseTotals>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).income_expense().await?))
}

#[instrument(skip(state, _admin))]
pub async fn by_date(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ByDateResponse>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).by_date().await?))
}

#[instrument(skip(state, _admin))]
pub async fn by_category(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ByCategoryResponse>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).by_category().await?))
}

#[instrument(skip(state, _admin))]
pub async fn category_totals(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<CategoryTotal>>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).category_totals().await?))
}

#[instrument(skip(state, _admin))]
pub async fn active_users_trend(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<MonthCount>>, AppError> {
    let now = OffsetDateTime::now_utc();
    Ok(Json(Analytics::new(state.store.as_ref()).user_trend(now).await?))
}

#[instrument(skip(state, _admin))]
pub async fn top_spenders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<TopSpender>>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).top_spenders().await?))
}

#[instrument(skip(state, _admin))]
pub async fn average_expense(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AverageExpense>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).average_expense().await?))
}

#[instrument(skip(state, _admin))]
pub async fn all_user_expenses(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AllUserExpenses>, AppError> {
    Ok(Json(Analytics::new(state.store.as_ref()).all_user_expenses().await?))
}
