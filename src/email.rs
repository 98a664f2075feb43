use anyhow::Context;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Outbound transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

/// Body of the OTP email. The expiry line always states the configured
/// window, not a hardcoded one.
fn otp_email_body(code: &str, ttl_minutes: i64) -> String {
    format!(
        "Your one-time password (OTP) is: {code}\n\
         \n\
         The code expires in {ttl_minutes} minutes.\n\
         \n\
         If you did not request this, you can safely ignore this email.\n"
    )
}

/// SMTP mailer used in production.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
    otp_ttl_minutes: i64,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, otp_ttl_minutes: i64) -> anyhow::Result<Self> {
        let from_address: Mailbox = config
            .from
            .parse()
            .context("SMTP_FROM is not a valid email address")?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = match config.tls.as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .context("failed to create SMTP TLS transport")?
                .port(config.port)
                .credentials(creds)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .credentials(creds)
                .build(),
            // default: STARTTLS
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .context("failed to create SMTP STARTTLS transport")?
                .port(config.port)
                .credentials(creds)
                .build(),
        };

        Ok(Self {
            mailer,
            from_address,
            otp_ttl_minutes,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let to_mailbox: Mailbox = to.parse().context("invalid recipient email address")?;

        let body = otp_email_body(code, self.otp_ttl_minutes);

        let email = Message::builder()
            .from(self.from_address.clone())
            .to(to_mailbox)
            .subject("Verify Your Email")
            .body(body)
            .context("failed to build email message")?;

        self.mailer
            .send(email)
            .await
            .context("failed to send email via SMTP")?;

        tracing::info!(to = %to, "OTP email sent");
        Ok(())
    }
}

/// Mailer that drops everything, used by `AppState::fake()`.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_otp(&self, to: &str, _code: &str) -> anyhow::Result<()> {
        tracing::debug!(to = %to, "noop mailer: dropping OTP email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_states_the_configured_expiry() {
        let body = otp_email_body("123456", 30);
        assert!(body.contains("123456"));
        assert!(body.contains("expires in 30 minutes"));

        // a different configured window must show up verbatim
        let body = otp_email_body("654321", 45);
        assert!(body.contains("expires in 45 minutes"));
    }
}
