//! Outbound notifications (email, SMS)
//!
//! Email goes out through Amazon SES and SMS through the Twilio messages API. A channel with no
//! configuration falls back to [`LogNotifier`].

use async_trait::async_trait;
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Failed to send {channel}: {reason}")]
pub struct NotifyError { pub channel: &'static str, pub reason: String }

impl NotifyError {
    fn email(reason: impl ToString) -> Self { Self { channel: "email", reason: reason.to_string() } }
    fn sms(reason: impl ToString) -> Self { Self { channel: "sms", reason: reason.to_string() } }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError>;
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    /// Verified SES sender address.
    pub from: String,
    /// Overrides the region from the AWS environment.
    pub ses_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub api_base: String,
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        tracing::info!(%to, %subject, "no email channel configured, email not delivered");
        tracing::debug!(%to, body = %html, "undelivered email");
        Ok(())
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(%to, "no sms channel configured, sms not delivered");
        tracing::debug!(%to, %body, "undelivered sms");
        Ok(())
    }
}

pub struct SesMailer {
    client: aws_sdk_sesv2::Client,
    from: String,
}

impl SesMailer {
    /// Loads credentials and region from the standard AWS environment.
    pub async fn connect(config: &EmailConfig) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = match &config.ses_region {
            Some(region) => {
                let regional = shared.to_builder().region(aws_config::Region::new(region.clone())).build();
                aws_sdk_sesv2::Client::new(&regional)
            }
            None => aws_sdk_sesv2::Client::new(&shared),
        };
        Self { client, from: config.from.clone() }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let subject = Content::builder().data(subject).build().map_err(NotifyError::email)?;
        let body = Body::builder().html(Content::builder().data(html).build().map_err(NotifyError::email)?).build();
        let message = Message::builder().subject(subject).body(body).build();

        self.client.send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| NotifyError::email(DisplayErrorContext(&e)))?;
        tracing::info!(%to, "email sent");
        Ok(())
    }
}

pub struct TwilioSms {
    http: reqwest::Client,
    config: SmsConfig,
}

impl TwilioSms {
    pub fn new(config: SmsConfig) -> Self { Self { http: reqwest::Client::new(), config } }

    pub async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let url = format!("{}/2010-04-01/Accounts/{}/Messages.json", self.config.api_base, self.config.account_sid);
        let response = self.http.post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(NotifyError::sms)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::sms(format!("{status}: {detail}")));
        }
        tracing::info!(%to, "sms sent");
        Ok(())
    }
}

/// Sends each message over its configured channel.
#[derive(Default)]
pub struct Dispatcher {
    email: Option<SesMailer>,
    sms: Option<TwilioSms>,
    fallback: LogNotifier,
}

impl Dispatcher {
    pub async fn connect(email: Option<&EmailConfig>, sms: Option<&SmsConfig>) -> Self {
        let email = match email {
            Some(config) => Some(SesMailer::connect(config).await),
            None => None,
        };
        let sms = sms.cloned().map(TwilioSms::new);
        tracing::info!(email = email.is_some(), sms = sms.is_some(), "notification channels");
        Self { email, sms, fallback: LogNotifier }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        match &self.email {
            Some(mailer) => mailer.send(to, subject, html).await,
            None => self.fallback.send_email(to, subject, html).await,
        }
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        match &self.sms {
            Some(sms) => sms.send(to, body).await,
            None => self.fallback.send_sms(to, body).await,
        }
    }
}

/// Sends an email in the background. The request never waits on delivery.
pub fn spawn_email(notifier: Arc<dyn Notifier>, to: String, subject: String, html: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send_email(&to, &subject, &html).await {
            tracing::warn!(%to, error = %e, "email not sent");
        }
    });
}
