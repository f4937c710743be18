//! Persistence seam for users, roles and expenses.
//!
//! Handlers and services only talk to [`Store`]; the Postgres implementation
//! lives in `crate::db`, and `memory` backs the test suite.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    expenses::repo_types::{Expense, NewExpense},
};

#[cfg(test)]
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds the value, e.g. `"email"`.
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("role {0} does not exist")]
    UnknownRole(i32),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// User row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserTally {
    pub total: u64,
    pub active: u64,
}

/// Expense row count and per-type amount sums. Sums are zero when no row
/// matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpenseTally {
    pub count: u64,
    pub income: Decimal,
    pub expense: Decimal,
}

impl ExpenseTally {
    /// Sum of every amount regardless of type.
    pub fn net(&self) -> Decimal {
        self.income + self.expense
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// All users, oldest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<Option<User>, StoreError>;

    /// Returns `Ok(None)` when the user does not exist.
    async fn update_user_role(&self, id: Uuid, role_id: i32) -> Result<Option<User>, StoreError>;

    /// Soft delete. Returns `Ok(None)` when the user does not exist.
    async fn deactivate_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn tally_users(&self) -> Result<UserTally, StoreError>;

    async fn create_expense(&self, new_expense: NewExpense) -> Result<Expense, StoreError>;

    /// All expenses, newest date first.
    async fn list_expenses(&self) -> Result<Vec<Expense>, StoreError>;

    /// One user's expenses, newest date first.
    async fn list_expenses_for_user(&self, user_id: Uuid) -> Result<Vec<Expense>, StoreError>;

    async fn tally_expenses(&self) -> Result<ExpenseTally, StoreError>;
}
