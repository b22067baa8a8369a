//! SMTP delivery through lettre.

use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use super::Mailer;
use crate::config::{EmailConfig, RuntimeSettings};

/// Sends through the SMTP settings current at the time of each message,
/// so edits on the configuration page apply without a restart.
pub struct SmtpMailer {
    settings: Arc<ArcSwap<RuntimeSettings>>,
}

impl SmtpMailer {
    pub fn new(settings: Arc<ArcSwap<RuntimeSettings>>) -> Self {
        Self { settings }
    }

    fn build_transport(config: &EmailConfig, host: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let config = self.settings.load().email.clone();

        let (Some(smtp_host), Some(from_address)) = (&config.smtp_host, &config.from_address) else {
            tracing::warn!(to = %to, subject = %subject, "Email not configured, message not sent");
            return Ok(());
        };

        let from: Mailbox = format!("{} <{}>", config.from_name, from_address).parse()?;
        let recipient: Mailbox = to.parse()?;

        let email = Message::builder()
            .from(from)
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        Self::build_transport(&config, smtp_host)?.send(email).await?;

        tracing::info!(
            to = %to,
            subject = %subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_unconfigured_smtp_is_not_an_error() {
        let settings = Arc::new(ArcSwap::from_pointee(RuntimeSettings::from_config(
            &Config::default(),
        )));
        let mailer = SmtpMailer::new(settings);
        mailer
            .send("someone@example.com", "Subject", "Body")
            .await
            .unwrap();
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_undelivered_message_body_stays_out_of_logs() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let settings = Arc::new(ArcSwap::from_pointee(RuntimeSettings::from_config(
            &Config::default(),
        )));
        SmtpMailer::new(settings)
            .send(
                "someone@example.com",
                "Password Reset",
                "http://localhost:8080/user/password/reset/01J0SECRETTOKEN",
            )
            .await
            .unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Email not configured"));
        assert!(logs.contains("Password Reset"));
        assert!(!logs.contains("01J0SECRETTOKEN"));
    }

    #[tokio::test]
    async fn test_bad_recipient_is_rejected_before_connecting() {
        let mut config = Config::default();
        config.email.smtp_host = Some("localhost".to_string());
        config.email.from_address = Some("noreply@example.com".to_string());
        let settings = Arc::new(ArcSwap::from_pointee(RuntimeSettings::from_config(&config)));

        let mailer = SmtpMailer::new(settings);
        assert!(mailer.send("not an address", "Subject", "Body").await.is_err());
    }
}
