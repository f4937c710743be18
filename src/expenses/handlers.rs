use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use axum_extra::extract::WithRejection;
use tracing::instrument;

use super::{dto::CreateExpenseRequest, repo_types::Expense, services};
use crate::{auth::extractors::ActiveUser, error::AppError, state::AppState};

pub fn expense_routes() -> Router<AppState> {
    Router::new().route("/api/expenses", get(list_my_expenses).post(create_expense))
}

#[instrument(skip(state, user, payload))]
pub async fn create_expense(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    WithRejection(Json(payload), _): WithRejection<Json<CreateExpenseRequest>, AppError>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    let expense = services::create_expense(state.store.as_ref(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[instrument(skip(state, user))]
pub async fn list_my_expenses(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
) -> Result<Json<Vec<Expense>>, AppError> {
    let expenses = services::list_for_user(state.store.as_ref(), user.id).await?;
    Ok(Json(expenses))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;
    use time::macros::date;

    use super::*;
    use crate::{
        auth::repo_types::USER_ROLE_ID,
        expenses::repo_types::ExpenseType,
        test_support::{request, TestApp},
    };

    #[tokio::test]
    async fn create_then_list_own_expenses() {
        let app = TestApp::new();
        let ada = app.seed_user("Ada", "ada@example.com", "correct-horse", USER_ROLE_ID).await;
        let bob = app.seed_user("Bob", "bob@example.com", "correct-horse", USER_ROLE_ID).await;
        app.seed_expense(bob.id, "40.00", ExpenseType::Expense, Some("Rent"), date!(2024 - 01 - 01))
            .await;
        let token = app.token_for(&ada);

        let (status, _, created) = app
            .send(request(
                Method::POST,
                "/api/expenses",
                Some(&token),
                Some(json!({
                    "amount": 12.5,
                    "type": "expense",
                    "category": "Food",
                    "paymentMethod": "card",
                    "date": "2024-03-05"
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["amount"], 12.5);
        assert_eq!(created["type"], "expense");
        assert_eq!(created["date"], "2024-03-05");
        assert_eq!(created["userId"], ada.id.to_string());

        let (status, _, listed) = app
            .send(request(Method::GET, "/api/expenses", Some(&token), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], created["id"]);
    }

    #[tokio::test]
    async fn malformed_bodies_are_a_400_envelope() {
        let app = TestApp::new();
        let ada = app.seed_user("Ada", "ada@example.com", "correct-horse", USER_ROLE_ID).await;
        let token = app.token_for(&ada);
        let valid = json!({
            "amount": 12.5,
            "type": "expense",
            "paymentMethod": "card",
            "date": "2024-03-05"
        });

        let mut bad_date = valid.clone();
        bad_date["date"] = json!("2024-13-45");
        let mut bad_type = valid.clone();
        bad_type["type"] = json!("refund");
        let mut bad_scale = valid.clone();
        bad_scale["amount"] = json!(12.345);

        for body in [bad_date, bad_type, bad_scale] {
            let (status, _, res) = app
                .send(request(Method::POST, "/api/expenses", Some(&token), Some(body.clone())))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(res["success"], false, "{body}");
            assert!(res["message"].is_string(), "{body}");
        }

        let (_, _, listed) = app
            .send(request(Method::GET, "/api/expenses", Some(&token), None))
            .await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::new();
        let (status, _, body) = app
            .send(request(Method::GET, "/api/expenses", None, None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn deactivated_users_are_rejected() {
        let app = TestApp::new();
        let ada = app.seed_user("Ada", "ada@example.com", "correct-horse", USER_ROLE_ID).await;
        let token = app.token_for(&ada);
        app.deactivate(ada.id).await;

        let (status, _, _) = app
            .send(request(Method::GET, "/api/expenses", Some(&token), None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
