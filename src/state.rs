use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;

use crate::auth::google::{GoogleOAuth, IdentityProvider};
use crate::auth::jwt::JwtKeys;
use crate::auth::memory::InMemoryUserDirectory;
use crate::auth::repo::{PgUserDirectory, UserDirectory};
use crate::config::AppConfig;
use crate::mail::{LogMailer, Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub directory: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn Mailer>,
    pub google: Option<Arc<dyn IdentityProvider>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let directory: Arc<dyn UserDirectory> = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                Arc::new(PgUserDirectory::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory user directory");
                Arc::new(InMemoryUserDirectory::new())
            }
        };

        let google = match &config.google {
            Some(g) => Some(Arc::new(GoogleOAuth::new(g.clone())) as Arc<dyn IdentityProvider>),
            None => {
                tracing::warn!("Google OAuth not configured; /auth/google is disabled");
                None
            }
        };

        let mailer = Arc::new(LogMailer::new(&config.frontend_url)) as Arc<dyn Mailer>;

        Ok(Self::from_parts(config, directory, mailer, google))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn Mailer>,
        google: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        Self {
            keys: JwtKeys::from_config(&config.jwt),
            config,
            directory,
            mailer,
            google,
        }
    }

    /// State backed by the in-memory directory and a recording mailer.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::mail::tests::RecordingMailer>) {
        let mailer = Arc::new(crate::mail::tests::RecordingMailer::default());
        (Self::fake_with(mailer.clone(), None), mailer)
    }

    #[cfg(test)]
    pub fn fake_with(
        mailer: Arc<crate::mail::tests::RecordingMailer>,
        google: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::auth::jwt::tests::test_jwt_config(),
            verification_ttl_minutes: 60,
            frontend_url: "http://localhost:3000".into(),
            google: None,
        });
        Self::from_parts(
            config,
            Arc::new(InMemoryUserDirectory::new()),
            mailer,
            google,
        )
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
