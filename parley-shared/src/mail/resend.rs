/// HTTP email delivery through the Resend API

use super::{subject_for, CodeMailer, MailError};
use crate::identity::codes::CodePurpose;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";

/// Sender settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: String,
    /// Sender address, e.g. `Parley <no-reply@parley.app>`
    pub from: String,
    /// Product name used in subjects and bodies
    pub app_name: String,
    /// Minutes a code stays valid, mentioned in the body
    pub code_ttl_minutes: i64,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
}

#[derive(Clone)]
pub struct ResendMailer {
    client: Client,
    config: EmailConfig,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Points the mailer at a different API root (self-hosted relay, test server)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn render(&self, code: &str, purpose: CodePurpose) -> String {
        let intro = match purpose {
            CodePurpose::VerifyEmail => "Your verification code is:",
            CodePurpose::ResetPassword => "Your password reset code is:",
        };
        let outro = match purpose {
            CodePurpose::VerifyEmail => "",
            CodePurpose::ResetPassword => " If you did not request this, you can ignore this email.",
        };

        format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2>{app}</h2>
            <p>{intro}</p>
            <div style="font-size: 32px; font-weight: bold; text-align: center; padding: 20px; letter-spacing: 8px;">{code}</div>
            <p style="color: #666; margin-top: 20px;">This code expires in {ttl} minutes.{outro}</p>
            </div>"#,
            app = self.config.app_name,
            ttl = self.config.code_ttl_minutes,
        )
    }
}

#[async_trait]
impl CodeMailer for ResendMailer {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose) -> Result<(), MailError> {
        let request = SendRequest {
            from: &self.config.from,
            to: vec![to],
            subject: subject_for(purpose, &self.config.app_name),
            html: self.render(code, purpose),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %to, purpose = ?purpose, "Verification email sent");
        Ok(())
    }
}
