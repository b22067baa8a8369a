//! Outbound account email: activation and password reset links.
//!
//! Delivery never blocks a request. Flows hand their work to [`dispatch`],
//! which runs it on a detached task and only logs failures.

mod email;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::future::Future;
use url::Url;

pub use email::SmtpMailer;

/// Capability to deliver one plain-text message
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// A rendered message ready for a [`Mailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn activation(link: &str) -> Self {
        Self {
            subject: "User Activation".to_string(),
            body: format!(
                "Use the following link to activate your account. If this was not requested by you, please ignore this email.\n{}",
                link
            ),
        }
    }

    pub fn password_reset(link: &str) -> Self {
        Self {
            subject: "Password Reset".to_string(),
            body: format!(
                "Use the following link to reset your password. If this was not requested by you, please ignore this email.\n{}",
                link
            ),
        }
    }
}

/// Append path segments to the public base URL.
///
/// `http://host/app` and `http://host/app/` give the same result.
pub fn build_link(base_url: &str, segments: &[&str]) -> Result<String> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("base URL cannot carry a path: {}", base_url))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

pub fn activation_link(base_url: &str, token: &str) -> Result<String> {
    build_link(base_url, &["activate", token])
}

pub fn password_reset_link(base_url: &str, token: &str) -> Result<String> {
    build_link(base_url, &["user", "password", "reset", token])
}

/// Run an email flow on a detached task. Errors end up in the log only.
pub fn dispatch<F>(flow: &'static str, task: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            tracing::error!(flow, error = %e, "Email flow failed");
        }
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    impl SentEmail {
        /// Last path segment of the link at the end of the body
        pub fn token(&self) -> String {
            self.body
                .trim_end()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        }
    }

    /// Keeps every message in memory
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentEmail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }

        /// Wait for the detached tasks to deliver `count` messages
        pub async fn wait_for(&self, count: usize) -> Vec<SentEmail> {
            for _ in 0..200 {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            panic!("expected {} emails, got {}", count, self.sent().len());
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_join_cleanly() {
        assert_eq!(
            activation_link("http://localhost:8080/", "01ABC").unwrap(),
            "http://localhost:8080/activate/01ABC"
        );
        assert_eq!(
            password_reset_link("https://example.com/app", "01ABC").unwrap(),
            "https://example.com/app/user/password/reset/01ABC"
        );
        assert_eq!(
            activation_link("https://example.com/app/", "01ABC").unwrap(),
            "https://example.com/app/activate/01ABC"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(activation_link("not a url", "01ABC").is_err());
        assert!(activation_link("mailto:someone@example.com", "01ABC").is_err());
    }

    #[test]
    fn test_email_bodies_end_with_link() {
        let email = Email::activation("http://x/activate/T");
        assert_eq!(email.subject, "User Activation");
        assert!(email.body.ends_with("\nhttp://x/activate/T"));

        let email = Email::password_reset("http://x/user/password/reset/T");
        assert!(email.body.ends_with("/reset/T"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_detached() {
        let mailer = std::sync::Arc::new(testing::RecordingMailer::default());
        let task_mailer = mailer.clone();
        dispatch("test", async move {
            task_mailer.send("a@b.com", "Hi", "body /T").await
        });

        let sent = mailer.wait_for(1).await;
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(sent[0].token(), "T");
    }
}
