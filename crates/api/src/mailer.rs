use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::EmailSettings;

pub const EMAILJS_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FROM_NAME: &str = "Imarahub Team";
const FROM_EMAIL: &str = "no-reply@imarahub.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeConfirmation {
  pub to_email: String,
  pub project_id: Uuid,
  pub project_title: String,
  pub amount: String,
  pub token: String,
  pub transaction_hash: String,
  pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct TemplateParams {
  to_email: String,
  from_name: &'static str,
  from_email: &'static str,
  project_title: String,
  project_id: String,
  amount: String,
  token: String,
  transaction_hash: String,
  date: String,
  time: String,
  project_url: String,
}

impl TemplateParams {
  fn new(confirmation: &StakeConfirmation, app_base_url: &str) -> Self {
    Self {
      to_email: confirmation.to_email.clone(),
      from_name: FROM_NAME,
      from_email: FROM_EMAIL,
      project_title: confirmation.project_title.clone(),
      project_id: confirmation.project_id.to_string(),
      amount: confirmation.amount.clone(),
      token: confirmation.token.clone(),
      transaction_hash: confirmation.transaction_hash.clone(),
      date: confirmation.sent_at.format("%Y-%m-%d").to_string(),
      time: confirmation.sent_at.format("%H:%M:%S UTC").to_string(),
      project_url: format!("{}/idea/{}", app_base_url.trim_end_matches('/'), confirmation.project_id),
    }
  }
}

/// Outbound notifications. Delivery failures are logged, never surfaced to the caller.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send_stake_confirmation(&self, confirmation: StakeConfirmation) -> bool;
}

pub struct EmailJsMailer {
  http: Client,
  endpoint: String,
  settings: EmailSettings,
}

impl EmailJsMailer {
  pub fn new(settings: EmailSettings) -> anyhow::Result<Self> {
    Self::with_endpoint(settings, EMAILJS_ENDPOINT)
  }

  pub fn with_endpoint(settings: EmailSettings, endpoint: impl Into<String>) -> anyhow::Result<Self> {
    let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    Ok(Self {
      http,
      endpoint: endpoint.into(),
      settings,
    })
  }
}

#[async_trait]
impl Mailer for EmailJsMailer {
  #[instrument(skip(self, confirmation), fields(project_id = %confirmation.project_id))]
  async fn send_stake_confirmation(&self, confirmation: StakeConfirmation) -> bool {
    let payload = json!({
      "service_id": self.settings.service_id,
      "template_id": self.settings.template_id,
      "user_id": self.settings.public_key,
      "template_params": TemplateParams::new(&confirmation, &self.settings.app_base_url),
    });

    match self.http.post(&self.endpoint).json(&payload).send().await {
      Ok(response) if response.status().is_success() => {
        info!("Stake confirmation sent to {}", confirmation.to_email);
        true
      },
      Ok(response) => {
        error!("Email service rejected stake confirmation: {}", response.status());
        false
      },
      Err(e) => {
        error!("Failed to send stake confirmation: {}", e);
        false
      },
    }
  }
}

/// Used when no email service is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  async fn send_stake_confirmation(&self, confirmation: StakeConfirmation) -> bool {
    info!(
      "Email delivery disabled, skip stake confirmation to {} for project {}",
      confirmation.to_email, confirmation.project_id
    );
    false
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use mockito::Matcher;

  use super::*;

  fn settings() -> EmailSettings {
    EmailSettings {
      service_id: "service".to_string(),
      template_id: "template".to_string(),
      public_key: "public".to_string(),
      app_base_url: "https://imarahub.com/".to_string(),
    }
  }

  fn confirmation() -> StakeConfirmation {
    StakeConfirmation {
      to_email: "amina@example.com".to_string(),
      project_id: Uuid::nil(),
      project_title: "Solar kiosks".to_string(),
      amount: "5".to_string(),
      token: "USDC".to_string(),
      transaction_hash: "0xabc".to_string(),
      sent_at: Utc.with_ymd_and_hms(2025, 6, 10, 9, 5, 0).unwrap(),
    }
  }

  #[test]
  fn test_template_params() {
    let params = TemplateParams::new(&confirmation(), "https://imarahub.com/");

    assert_eq!(params.date, "2025-06-10");
    assert_eq!(params.time, "09:05:00 UTC");
    assert_eq!(
      params.project_url,
      "https://imarahub.com/idea/00000000-0000-0000-0000-000000000000"
    );
  }

  #[tokio::test]
  async fn test_emailjs_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/send")
      .match_body(Matcher::PartialJson(json!({
        "service_id": "service",
        "template_id": "template",
        "user_id": "public",
        "template_params": { "to_email": "amina@example.com", "transaction_hash": "0xabc" },
      })))
      .with_status(200)
      .with_body("OK")
      .create_async()
      .await;

    let mailer = EmailJsMailer::with_endpoint(settings(), format!("{}/send", server.url())).unwrap();

    assert!(mailer.send_stake_confirmation(confirmation()).await);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_rejected_delivery_returns_false() {
    let mut server = mockito::Server::new_async().await;
    server.mock("POST", "/send").with_status(400).create_async().await;

    let mailer = EmailJsMailer::with_endpoint(settings(), format!("{}/send", server.url())).unwrap();

    assert!(!mailer.send_stake_confirmation(confirmation()).await);
  }
}
