use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::analytics::{ExpensesByDate, UserExpenseDigest};
use crate::auth::dto::PublicUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role_id: i32,
}

#[derive(Debug, Serialize)]
pub struct UserUpdatedResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct AdminMessage {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total_users: u64,
    pub active_users: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseTotals {
    /// Number of expense rows of either type.
    pub total_expenses: u64,
    pub net_amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetAmount {
    pub net_amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByDateResponse {
    pub expenses_by_date: ExpensesByDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByCategoryResponse {
    pub expenses_by_category: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageExpense {
    pub avg_expense_per_user: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AllUserExpenses {
    pub users: Vec<UserExpenseDigest>,
}
