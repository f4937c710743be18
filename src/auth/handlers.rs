use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar, SameSite},
    WithRejection,
};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{
        AuthResponse, GoogleLoginRequest, LoginRequest, MessageResponse, OAuthCallbackQuery,
        PublicUser, RegisterRequest, RegisterResponse, SendOtpRequest,
    },
    extractors::{ActiveUser, AUTH_COOKIE},
    services,
};
use crate::{error::AppError, state::AppState};

const OAUTH_STATE_COOKIE: &str = "oauthState";
const AUTH_COOKIE_MAX_AGE: time::Duration = time::Duration::hours(1);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/send-otp", post(send_otp))
        .route("/api/auth/google-login", post(google_login))
        .route("/api/auth/me", get(get_me))
}

/// Browser-facing Google code flow.
pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/logout", get(logout))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = services::login(&state, &payload.email, &payload.password).await?;
    let token = services::issue_token(&state, user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User registered successfully".into(),
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SendOtpRequest>, AppError>,
) -> Result<Json<MessageResponse>, AppError> {
    services::send_otp(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "OTP sent to admin".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<GoogleLoginRequest>, AppError>,
) -> Result<Json<AuthResponse>, AppError> {
    let profile = state
        .identity
        .verify_id_token(payload.token.trim())
        .await
        .map_err(|e| {
            warn!(error = %e, "google id token rejected");
            AppError::Auth("Invalid Google token".into())
        })?;
    let user = services::sign_in_with_google(&state, profile).await?;
    let token = services::issue_token(&state, user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(user))]
pub async fn get_me(ActiveUser(user): ActiveUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}

#[instrument(skip(state, jar))]
pub async fn google_start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let url = state.identity.authorize_url(&csrf)?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf))
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::minutes(10));
    Ok((jar.add(cookie), Redirect::to(&url)))
}

#[instrument(skip(state, jar, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> (CookieJar, Redirect) {
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path("/"));
    let frontend = state.config.frontend_url.trim_end_matches('/').to_string();
    let failure = Redirect::to(&format!("{frontend}/login"));

    if let Some(reason) = &query.error {
        warn!(reason = %reason, "google consent refused");
        return (jar, failure);
    }
    let (Some(code), Some(returned)) = (query.code.as_deref(), query.state.as_deref()) else {
        warn!("google callback missing code or state");
        return (jar, failure);
    };
    if expected.as_deref() != Some(returned) {
        warn!("google callback state mismatch");
        return (jar, failure);
    }

    let signed_in = async {
        let profile = state
            .identity
            .exchange_code(code)
            .await
            .map_err(|source| AppError::External {
                operation: "exchange google code",
                source,
            })?;
        let user = services::sign_in_with_google(&state, profile).await?;
        let token = services::issue_token(&state, user.id)?;
        Ok::<_, AppError>((user, token))
    }
    .await;

    match signed_in {
        Ok((user, token)) => {
            let cookie = Cookie::build((AUTH_COOKIE, token))
                .http_only(true)
                .secure(state.config.cookie_secure)
                .same_site(SameSite::Lax)
                .path("/")
                .max_age(AUTH_COOKIE_MAX_AGE);
            info!(user_id = %user.id, "google sign-in complete");
            (jar.add(cookie), Redirect::to(&frontend))
        }
        Err(e) => {
            error!(error = %e, "google sign-in failed");
            (jar, failure)
        }
    }
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    (jar, Redirect::to(&state.config.frontend_url))
}
