use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

/// Outbound email contract. Delivery mechanics live behind this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_email(&self, to: &str, name: &str, token: &str) -> anyhow::Result<()>;
}

/// Writes the message to the log instead of sending it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    frontend_url: String,
}

impl LogMailer {
    pub fn new(frontend_url: &str) -> Self {
        Self {
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }
}

pub fn verification_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/verify-email?token={}",
        frontend_url.trim_end_matches('/'),
        token
    )
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(&self, to: &str, name: &str, token: &str) -> anyhow::Result<()> {
        let link = verification_link(&self.frontend_url, token);
        info!(
            to = %to,
            subject = "Verify Your Email Address",
            %link,
            "Hi {name}, please click the link to verify your email. It expires in 1 hour."
        );
        Ok(())
    }
}

/// Sends the verification email in the background. Failures are logged only;
/// the caller's operation has already committed.
pub fn dispatch_verification_email(mailer: Arc<dyn Mailer>, to: String, name: String, token: String) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send_verification_email(&to, &name, &token).await {
            error!(error = %e, email = %to, "failed to send verification email");
        }
    });
}
