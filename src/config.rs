use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: u64,
    /// Inbox that receives admin registration codes.
    pub operator_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// HTTP relay endpoint; mail is only logged when unset.
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub mail: MailConfig,
    pub google: GoogleConfig,
    pub frontend_url: String,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "expense-tracker"),
            audience: env_or("JWT_AUDIENCE", "expense-tracker-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };
        let otp = OtpConfig {
            ttl_seconds: env_parse("OTP_TTL_SECONDS", 600),
            operator_email: env_or("OTP_OPERATOR_EMAIL", "admin@localhost"),
        };
        let mail = MailConfig {
            relay_url: std::env::var("MAIL_RELAY_URL").ok().filter(|v| !v.is_empty()),
            api_key: std::env::var("MAIL_RELAY_API_KEY").ok().filter(|v| !v.is_empty()),
            from: env_or("MAIL_FROM", "no-reply@localhost"),
        };
        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID")?,
            client_secret: env_or("GOOGLE_CLIENT_SECRET", ""),
            redirect_url: env_or(
                "GOOGLE_REDIRECT_URL",
                "http://localhost:8080/auth/google/callback",
            ),
        };
        Ok(Self {
            database_url,
            jwt,
            otp,
            mail,
            google,
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
            cookie_secure: env_parse("COOKIE_SECURE", false),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
