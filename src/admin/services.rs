use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{
    analytics::{self, CategoryTotal, MonthCount, TopSpender},
    dto::{
        AllUserExpenses, AverageExpense, ByCategoryResponse, ByDateResponse, ExpenseTotals,
        NetAmount, UserCounts,
    },
};
use crate::{
    auth::repo_types::User,
    error::{AppError, StoreResultExt},
    expenses::repo_types::Expense,
    store::{ExpenseTally, Store, StoreError},
};

/// Dashboard views. Scalar totals come from store aggregates; grouped views
/// are computed from fresh snapshots.
pub struct Analytics<'a> {
    store: &'a dyn Store,
}

impl<'a> Analytics<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    async fn users(&self) -> Result<Vec<User>, AppError> {
        self.store.list_users().await.during("list users")
    }

    async fn expenses(&self) -> Result<Vec<Expense>, AppError> {
        self.store.list_expenses().await.during("list expenses")
    }

    pub async fn user_counts(&self) -> Result<UserCounts, AppError> {
        let tally = self.store.tally_users().await.during("count users")?;
        Ok(UserCounts {
            total_users: tally.total,
            active_users: tally.active,
        })
    }

    async fn expense_tally(&self) -> Result<ExpenseTally, AppError> {
        self.store.tally_expenses().await.during("sum expenses")
    }

    pub async fn expense_totals(&self) -> Result<ExpenseTotals, AppError> {
        let tally = self.expense_tally().await?;
        Ok(ExpenseTotals {
            total_expenses: tally.count,
            net_amount: tally.net(),
        })
    }

    pub async fn net_amount(&self) -> Result<NetAmount, AppError> {
        Ok(NetAmount {
            net_amount: self.expense_tally().await?.net(),
        })
    }

    pub async fn income_expense(&self) -> Result<analytics::IncomeExpenseTotals, AppError> {
        let tally = self.expense_tally().await?;
        Ok(analytics::IncomeExpenseTotals {
            total_income: tally.income,
            total_expense: tally.expense,
        })
    }

    pub async fn by_date(&self) -> Result<ByDateResponse, AppError> {
        Ok(ByDateResponse {
            expenses_by_date: analytics::group_by_calendar_date(&self.expenses().await?),
        })
    }

    pub async fn by_category(&self) -> Result<ByCategoryResponse, AppError> {
        Ok(ByCategoryResponse {
            expenses_by_category: analytics::group_by_category(&self.expenses().await?),
        })
    }

    pub async fn category_totals(&self) -> Result<Vec<CategoryTotal>, AppError> {
        Ok(analytics::group_by_category_sum(&self.expenses().await?))
    }

    pub async fn user_trend(&self, now: OffsetDateTime) -> Result<Vec<MonthCount>, AppError> {
        let users = self.users().await?;
        Ok(analytics::monthly_user_trend(
            &users,
            now,
            analytics::TREND_WINDOW_MONTHS,
        ))
    }

    pub async fn top_spenders(&self) -> Result<Vec<TopSpender>, AppError> {
        let expenses = self.expenses().await?;
        let users = self.users().await?;
        Ok(analytics::top_spenders(
            &expenses,
            &users,
            analytics::TOP_SPENDERS_LIMIT,
        ))
    }

    pub async fn average_expense(&self) -> Result<AverageExpense, AppError> {
        let expenses = self.expenses().await?;
        let users = self.users().await?;
        Ok(AverageExpense {
            avg_expense_per_user: analytics::average_expense_per_user(&expenses, &users),
        })
    }

    pub async fn all_user_expenses(&self) -> Result<AllUserExpenses, AppError> {
        let users = self.users().await?;
        let expenses = self.expenses().await?;
        Ok(AllUserExpenses {
            users: analytics::per_user_digest(&users, &expenses),
        })
    }
}

pub async fn list_users(store: &dyn Store) -> Result<Vec<User>, AppError> {
    store.list_users().await.during("list users")
}

pub async fn update_user_role(
    store: &dyn Store,
    admin_id: Uuid,
    user_id: Uuid,
    role_id: i32,
) -> Result<User, AppError> {
    let user = store
        .update_user_role(user_id, role_id)
        .await
        .map_err(|e| match e {
            StoreError::UnknownRole(id) => AppError::Validation(format!("Unknown role {id}")),
            other => AppError::Store {
                operation: "update user role",
                source: other,
            },
        })?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(admin_id = %admin_id, user_id = %user.id, role_id, "user role updated");
    Ok(user)
}

pub async fn deactivate_user(
    store: &dyn Store,
    admin_id: Uuid,
    user_id: Uuid,
) -> Result<User, AppError> {
    let user = store
        .deactivate_user(user_id)
        .await
        .during("deactivate user")?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(admin_id = %admin_id, user_id = %user.id, "user deactivated");
    Ok(user)
}
