use std::{sync::Arc, time::Duration};

use tracing::warn;

use crate::auth::{
    google::{GoogleOAuth, IdentityProvider},
    otp::OtpStore,
};
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::mailer::{self, Mailer};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub otp: Arc<OtpStore>,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgStore::connect(&config.database_url).await?;
        if let Err(e) = db.migrate().await {
            warn!(error = %e, "migrations failed; continuing");
        }

        let mailer = mailer::from_config(&config.mail)?;
        let identity = Arc::new(GoogleOAuth::new(config.google.clone())?) as Arc<dyn IdentityProvider>;
        let otp = Arc::new(OtpStore::new(Duration::from_secs(config.otp.ttl_seconds)));

        Ok(Self::from_parts(Arc::new(db), config, otp, mailer, identity))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        otp: Arc<OtpStore>,
        mailer: Arc<dyn Mailer>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            config,
            otp,
            mailer,
            identity,
        }
    }
}
