/// Outbound email for verification codes
///
/// The identity engine only sees the [`CodeMailer`] trait. Delivery failures
/// are returned to the caller, which logs them and moves on: an issued code
/// stays valid whether or not the email went out.
///
/// Implementations:
/// - [`resend::ResendMailer`]: HTTP email API
/// - [`LogMailer`]: writes the code to the log, for development without email
/// - [`RecordingMailer`]: keeps sent codes in memory, for tests and demos

pub mod resend;

use crate::identity::codes::CodePurpose;
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Email request failed: {0}")]
    Transport(String),

    #[error("Email API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<(), MailError>;
}

/// Subject line for a code email
pub fn subject_for(purpose: CodePurpose, app_name: &str) -> String {
    match purpose {
        CodePurpose::VerifyEmail => format!("{} - Verify your email", app_name),
        CodePurpose::ResetPassword => format!("{} - Reset your password", app_name),
    }
}

/// Logs codes instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl CodeMailer for LogMailer {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<(), MailError> {
        tracing::warn!(
            to = %to,
            code = %code,
            purpose = ?purpose,
            "Email delivery is not configured; logging verification code instead"
        );
        Ok(())
    }
}

/// One captured message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    pub to: String,
    pub code: String,
    pub purpose: CodePurpose,
}

/// Captures every message in memory
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentCode>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().await.clone()
    }

    /// Most recent code sent to `to`
    pub async fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to == to)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl CodeMailer for RecordingMailer {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<(), MailError> {
        self.sent.lock().await.push(SentCode {
            to: to.to_string(),
            code: code.to_string(),
            purpose,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_for() {
        assert_eq!(
            subject_for(CodePurpose::VerifyEmail, "Parley"),
            "Parley - Verify your email"
        );
        assert_eq!(
            subject_for(CodePurpose::ResetPassword, "Parley"),
            "Parley - Reset your password"
        );
    }

    #[tokio::test]
    async fn test_recording_mailer_returns_latest() {
        let mailer = RecordingMailer::new();
        mailer.send_code("a@x.com", "111111", CodePurpose::VerifyEmail).await.unwrap();
        mailer.send_code("b@x.com", "222222", CodePurpose::VerifyEmail).await.unwrap();
        mailer.send_code("a@x.com", "333333", CodePurpose::ResetPassword).await.unwrap();

        assert_eq!(mailer.last_code_for("a@x.com").await.as_deref(), Some("333333"));
        assert_eq!(mailer.sent().await.len(), 3);
        assert!(mailer.last_code_for("c@x.com").await.is_none());
    }
}
