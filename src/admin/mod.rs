use crate::state::AppState;
use axum::Router;

pub mod analytics;
mod dto;
pub mod handlers;
mod services;

pub fn router() -> Router<AppState> {
    handlers::admin_routes()
}
