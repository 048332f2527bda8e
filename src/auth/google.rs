use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::GoogleConfig;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity asserted by the provider after a successful consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Third-party sign-in seam: builds the consent URL and turns a callback code into a profile.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorize_url(&self) -> anyhow::Result<String>;
    async fn fetch_profile(&self, code: &str) -> anyhow::Result<GoogleProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
}

pub struct GoogleOAuth {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn authorize_url(&self) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_ENDPOINT,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
            ],
        )
        .context("build google authorize url")?;
        Ok(url.into())
    }

    async fn fetch_profile(&self, code: &str) -> anyhow::Result<GoogleProfile> {
        let token = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token exchange")?
            .error_for_status()
            .context("google token exchange status")?
            .json::<TokenResponse>()
            .await
            .context("decode google token response")?;

        let info = self
            .http
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo")?
            .error_for_status()
            .context("google userinfo status")?
            .json::<UserInfo>()
            .await
            .context("decode google userinfo")?;

        let profile = profile_from_userinfo(info)?;
        debug!(email = %profile.email, "google profile resolved");
        Ok(profile)
    }
}

fn profile_from_userinfo(info: UserInfo) -> anyhow::Result<GoogleProfile> {
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow::anyhow!("google profile has no email"))?;
    if !info.email_verified {
        warn!(%email, "google reported an unverified email");
        anyhow::bail!("google email is not verified");
    }
    Ok(GoogleProfile {
        email,
        first_name: info.given_name.unwrap_or_default(),
        last_name: info.family_name.unwrap_or_default(),
    })
}
