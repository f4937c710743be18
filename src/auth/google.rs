//! Google sign-in: authorization-code exchange and id-token verification.
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity claims taken from a verified Google id token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page URL for the server-side code flow.
    fn authorize_url(&self, state: &str) -> anyhow::Result<String>;

    /// Verify an id token and return its claims.
    async fn verify_id_token(&self, id_token: &str) -> anyhow::Result<GoogleProfile>;

    /// Exchange an authorization code for a verified profile.
    async fn exchange_code(&self, code: &str) -> anyhow::Result<GoogleProfile>;
}

pub struct GoogleOAuth {
    client: reqwest::Client,
    cfg: GoogleConfig,
}

impl GoogleOAuth {
    pub fn new(cfg: GoogleConfig) -> anyhow::Result<Self> {
        if cfg.client_id.trim().is_empty() {
            bail!("google client id is not configured");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build google client")?;
        Ok(Self { client, cfg })
    }
}

#[derive(Deserialize)]
struct TokenInfo {
    sub: String,
    aud: String,
    email: Option<String>,
    // tokeninfo returns booleans as strings
    email_verified: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
}

fn profile_from(info: TokenInfo, client_id: &str) -> anyhow::Result<GoogleProfile> {
    if client_id.is_empty() || info.aud != client_id {
        bail!("id token issued for another client");
    }
    let Some(email) = info.email.filter(|e| !e.is_empty()) else {
        bail!("id token carries no email");
    };
    Ok(GoogleProfile {
        subject: info.sub,
        email,
        email_verified: info.email_verified.as_deref() == Some("true"),
        name: info.name.filter(|n| !n.trim().is_empty()),
    })
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.cfg.client_id.as_str()),
                ("redirect_uri", self.cfg.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .context("build authorize url")?;
        Ok(url.into())
    }

    async fn verify_id_token(&self, id_token: &str) -> anyhow::Result<GoogleProfile> {
        let info: TokenInfo = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("tokeninfo request")?
            .error_for_status()
            .context("tokeninfo rejected token")?
            .json()
            .await
            .context("decode tokeninfo")?;
        let profile = profile_from(info, &self.cfg.client_id)?;
        debug!(subject = %profile.subject, "google id token verified");
        Ok(profile)
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<GoogleProfile> {
        let token: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("redirect_uri", self.cfg.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("token exchange request")?
            .error_for_status()
            .context("token exchange rejected code")?
            .json()
            .await
            .context("decode token response")?;
        self.verify_id_token(&token.id_token).await
    }
}
