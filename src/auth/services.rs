use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::RegisterRequest,
    google::GoogleProfile,
    jwt::JwtKeys,
    otp::codes_match,
    password::{hash_password, verify_password, OAUTH_PASSWORD_SENTINEL},
    repo_types::{NewUser, User, ADMIN_ROLE, ADMIN_ROLE_ID, USER_ROLE, USER_ROLE_ID},
};
use crate::{
    error::{AppError, StoreResultExt},
    mailer::OutgoingMail,
    state::AppState,
    store::StoreError,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, AppError> {
    Ok(JwtKeys::from_ref(state).sign(user_id)?)
}

fn ensure_active(user: &User) -> Result<(), AppError> {
    if !user.is_active {
        warn!(user_id = %user.id, "sign-in attempt on deactivated account");
        return Err(AppError::Auth("Account is deactivated".into()));
    }
    Ok(())
}

/// Password login. Unknown email and wrong password fail identically.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);

    let Some(user) = state
        .store
        .find_user_by_email(&email)
        .await
        .during("look up user")?
    else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    ensure_active(&user)?;

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Register a password account.
///
/// Any pending OTP for the email is consumed up front, so a code is good for
/// exactly one registration attempt.
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email);
    let pending_otp = state.otp.consume(&email);

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation("Password too short".into()));
    }

    let role = req
        .role
        .as_deref()
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| USER_ROLE.to_string());
    let role_id = match role.as_str() {
        ADMIN_ROLE => ADMIN_ROLE_ID,
        USER_ROLE => USER_ROLE_ID,
        _ => return Err(AppError::Validation(format!("Unknown role \"{role}\""))),
    };

    if role_id == ADMIN_ROLE_ID {
        let Some(otp) = req.otp.as_deref().map(str::trim).filter(|o| !o.is_empty()) else {
            return Err(AppError::Validation(
                "OTP is required for admin registration".into(),
            ));
        };
        if !pending_otp.is_some_and(|code| codes_match(&code, otp)) {
            warn!(email = %email, "admin registration with invalid otp");
            return Err(AppError::Validation("Invalid OTP".into()));
        }
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .store
        .create_user(NewUser {
            name: name.to_string(),
            email: email.clone(),
            password_hash,
            role_id,
            google_id: None,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AppError::Validation("Email already registered".into()),
            other => AppError::Store {
                operation: "create user",
                source: other,
            },
        })?;

    info!(user_id = %user.id, role = %role, "user registered");
    Ok(user)
}

/// Issue an admin registration code and mail it to the operator inbox.
pub async fn send_otp(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    let code = state.otp.issue(&email);
    let mail = OutgoingMail {
        to: state.config.otp.operator_email.clone(),
        subject: "Admin Registration OTP".into(),
        text: format!("OTP for {email}: {code}"),
    };
    if let Err(source) = state.mailer.send(mail).await {
        state.otp.discard(&email);
        return Err(AppError::External {
            operation: "send OTP",
            source,
        });
    }

    info!(email = %email, "admin otp issued");
    Ok(())
}

/// Find or create the account behind a verified Google profile.
///
/// Lookup order: Google subject, then a verified email matching an existing
/// account (which gets linked), then a new `user` account whose password can
/// never verify.
pub async fn sign_in_with_google(state: &AppState, profile: GoogleProfile) -> Result<User, AppError> {
    if let Some(user) = state
        .store
        .find_user_by_google_id(&profile.subject)
        .await
        .during("look up google account")?
    {
        ensure_active(&user)?;
        return Ok(user);
    }

    let email = normalize_email(&profile.email);
    if let Some(existing) = state
        .store
        .find_user_by_email(&email)
        .await
        .during("look up user")?
    {
        if !profile.email_verified {
            return Err(AppError::Validation("Email already registered".into()));
        }
        ensure_active(&existing)?;
        let linked = state
            .store
            .link_google_id(existing.id, &profile.subject)
            .await
            .during("link google account")?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        ensure_active(&linked)?;
        info!(user_id = %linked.id, "google account linked");
        return Ok(linked);
    }

    let name = profile
        .name
        .clone()
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash: OAUTH_PASSWORD_SENTINEL.to_string(),
            role_id: USER_ROLE_ID,
            google_id: Some(profile.subject),
        })
        .await
        .during("create user")?;

    info!(user_id = %user.id, "user created from google sign-in");
    Ok(user)
}
