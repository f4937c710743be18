//! Shared fixtures for handler and service tests.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::FromRef,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use time::Date;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{
        google::{GoogleProfile, IdentityProvider},
        jwt::JwtKeys,
        otp::OtpStore,
        password::hash_password,
        repo_types::{NewUser, User},
    },
    config::{AppConfig, GoogleConfig, JwtConfig, MailConfig, OtpConfig},
    expenses::repo_types::{Expense, ExpenseType, NewExpense},
    mailer::{Mailer, OutgoingMail},
    state::AppState,
    store::{memory::MemoryStore, Store},
};

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail_next: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("relay refused connection"));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// Accepts only tokens and codes registered with [`FakeIdentity::accept`].
#[derive(Default)]
pub struct FakeIdentity {
    known: Mutex<HashMap<String, GoogleProfile>>,
}

impl FakeIdentity {
    pub fn accept(&self, token_or_code: &str, profile: GoogleProfile) {
        self.known
            .lock()
            .unwrap()
            .insert(token_or_code.to_string(), profile);
    }

    fn lookup(&self, key: &str) -> anyhow::Result<GoogleProfile> {
        self.known
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("unknown token"))
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        Ok(format!("https://accounts.test/consent?state={state}"))
    }

    async fn verify_id_token(&self, id_token: &str) -> anyhow::Result<GoogleProfile> {
        self.lookup(id_token)
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<GoogleProfile> {
        self.lookup(code)
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "expense-tracker".into(),
            audience: "expense-tracker-users".into(),
            ttl_minutes: 60,
        },
        otp: OtpConfig {
            ttl_seconds: 600,
            operator_email: "operator@example.com".into(),
        },
        mail: MailConfig {
            relay_url: None,
            api_key: None,
            from: "no-reply@example.com".into(),
        },
        google: GoogleConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:8080/auth/google/callback".into(),
        },
        frontend_url: "http://localhost:5173".into(),
        cookie_secure: false,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub identity: Arc<FakeIdentity>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let identity = Arc::new(FakeIdentity::default());
        let config = Arc::new(test_config());
        let otp = Arc::new(OtpStore::new(Duration::from_secs(config.otp.ttl_seconds)));
        let state = AppState::from_parts(
            store.clone(),
            config,
            otp,
            mailer.clone(),
            identity.clone(),
        );
        Self {
            state,
            store,
            mailer,
            identity,
        }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    pub async fn seed_user(&self, name: &str, email: &str, password: &str, role_id: i32) -> User {
        self.store
            .create_user(NewUser {
                name: name.into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                role_id,
                google_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn deactivate(&self, user_id: Uuid) {
        self.store.deactivate_user(user_id).await.unwrap();
    }

    pub fn token_for(&self, user: &User) -> String {
        JwtKeys::from_ref(&self.state).sign(user.id).unwrap()
    }

    pub async fn seed_expense(
        &self,
        user_id: Uuid,
        amount: &str,
        kind: ExpenseType,
        category: Option<&str>,
        date: Date,
    ) -> Expense {
        self.store
            .create_expense(NewExpense {
                user_id,
                amount: Decimal::from_str(amount).unwrap(),
                kind,
                category: category.map(Into::into),
                description: None,
                payment_method: "cash".into(),
                date,
            })
            .await
            .unwrap()
    }

    /// Code from the most recent OTP mail.
    pub fn last_otp_code(&self) -> Option<String> {
        let sent = self.mailer.sent();
        let text = &sent.last()?.text;
        text.rsplit(": ").next().map(str::to_string)
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let res = self.router().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
