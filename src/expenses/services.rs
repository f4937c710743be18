use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::CreateExpenseRequest,
    repo_types::{Expense, NewExpense},
};
use crate::{
    error::{AppError, StoreResultExt},
    store::Store,
};

/// Amounts are stored as `NUMERIC(14,2)`.
const AMOUNT_SCALE: u32 = 2;
/// Exclusive bound on the absolute amount.
const AMOUNT_LIMIT: i64 = 1_000_000_000_000;

fn check_amount(amount: Decimal) -> Result<(), AppError> {
    if amount.is_zero() {
        return Err(AppError::Validation("Amount must not be zero".into()));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(AppError::Validation(
            "Amount must have at most two decimal places".into(),
        ));
    }
    if amount.abs() >= Decimal::from(AMOUNT_LIMIT) {
        return Err(AppError::Validation("Amount is too large".into()));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Record a transaction for `user_id`.
pub async fn create_expense(
    store: &dyn Store,
    user_id: Uuid,
    req: CreateExpenseRequest,
) -> Result<Expense, AppError> {
    let payment_method = req.payment_method.trim();
    if payment_method.is_empty() {
        return Err(AppError::Validation("Payment method is required".into()));
    }
    check_amount(req.amount)?;

    let expense = store
        .create_expense(NewExpense {
            user_id,
            amount: req.amount,
            kind: req.kind,
            category: trimmed(req.category),
            description: trimmed(req.description),
            payment_method: payment_method.to_string(),
            date: req.date,
        })
        .await
        .during("create expense")?;

    info!(user_id = %user_id, expense_id = %expense.id, "expense created");
    Ok(expense)
}

pub async fn list_for_user(store: &dyn Store, user_id: Uuid) -> Result<Vec<Expense>, AppError> {
    store
        .list_expenses_for_user(user_id)
        .await
        .during("list expenses")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use time::macros::date;

    use super::*;
    use crate::{
        auth::repo_types::USER_ROLE_ID, expenses::repo_types::ExpenseType,
        test_support::TestApp,
    };

    fn req(amount: Decimal, payment_method: &str) -> CreateExpenseRequest {
        CreateExpenseRequest {
            amount,
            kind: ExpenseType::Expense,
            category: Some("  Food ".into()),
            description: Some("".into()),
            payment_method: payment_method.into(),
            date: date!(2024 - 03 - 05),
        }
    }

    #[tokio::test]
    async fn rejects_zero_amount_and_missing_payment_method() {
        let app = TestApp::new();
        let user = app.seed_user("Ada", "ada@example.com", "correct-horse", USER_ROLE_ID).await;

        let zero = create_expense(app.store.as_ref(), user.id, req(Decimal::ZERO, "cash")).await;
        assert!(matches!(zero, Err(AppError::Validation(_))));

        let blank = create_expense(app.store.as_ref(), user.id, req(Decimal::ONE, "  ")).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn trims_optional_text_fields() {
        let app = TestApp::new();
        let user = app.seed_user("Ada", "ada@example.com", "correct-horse", USER_ROLE_ID).await;

        let expense = create_expense(app.store.as_ref(), user.id, req(Decimal::new(999, 2), " card "))
            .await
            .unwrap();
        assert_eq!(expense.category.as_deref(), Some("Food"));
        assert_eq!(expense.description, None);
        assert_eq!(expense.payment_method, "card");

        let listed = list_for_user(app.store.as_ref(), user.id).await.unwrap();
        assert_eq!(listed, vec![expense]);
    }

    #[tokio::test]
    async fn rejects_amounts_the_column_cannot_hold_exactly() {
        let app = TestApp::new();
        let user = app.seed_user("Ada", "ada@example.com", "correct-horse", USER_ROLE_ID).await;

        for raw in ["12.345", "1000000000000", "-1000000000000.00"] {
            let amount = Decimal::from_str(raw).unwrap();
            let result = create_expense(app.store.as_ref(), user.id, req(amount, "cash")).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{raw}");
        }
        assert!(list_for_user(app.store.as_ref(), user.id).await.unwrap().is_empty());

        for raw in ["12.500", "999999999999.99", "-0.01"] {
            let amount = Decimal::from_str(raw).unwrap();
            let created = create_expense(app.store.as_ref(), user.id, req(amount, "cash"))
                .await
                .unwrap();
            assert_eq!(created.amount, amount, "{raw}");
        }
    }
}
