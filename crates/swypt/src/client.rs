use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::{
  error::{SwyptError, SwyptResult},
  phone::normalize_phone,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_HEADER: &str = "x-api-key";
const API_SECRET_HEADER: &str = "x-api-secret";
const DEPOSIT_CHAIN: &str = "lisk";
const DEPOSIT_PROJECT: &str = "imara";

#[derive(Debug, Clone)]
pub struct SwyptConfig {
  pub base_url: String,
  pub api_key: String,
  pub api_secret: String,
  /// Address that receives the on-ramped tokens.
  pub deposit_address: String,
  pub token_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnrampOrder {
  #[serde(rename = "orderID")]
  pub order_id: String,
  pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
  Success,
  Failed,
  Cancelled,
  #[serde(other)]
  Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
  pub status: OrderState,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
  pub hash: String,
  pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
  pub r#type: String,
  pub amount: String,
  pub fiat_currency: String,
  pub crypto_currency: String,
  pub network: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
}

/// Order lookups the settlement flow depends on.
#[async_trait]
pub trait OrderGateway: Send + Sync {
  async fn order_status(&self, order_id: &str) -> SwyptResult<OrderStatus>;

  async fn crypto_transfer(&self, order_id: &str) -> SwyptResult<TransferReceipt>;
}

/// HTTP client for the Swypt on-ramp / off-ramp API.
#[derive(Debug, Clone)]
pub struct SwyptClient {
  config: SwyptConfig,
  http: Client,
}

impl SwyptClient {
  pub fn new(config: SwyptConfig) -> SwyptResult<Self> {
    let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    Ok(Self { config, http })
  }

  /// Sends an STK push to `phone` for `amount` KES.
  #[instrument(skip(self))]
  pub async fn initiate_onramp(&self, phone: &str, amount: u64) -> SwyptResult<OnrampOrder> {
    let payload = json!({
      "partyA": normalize_phone(phone),
      "amount": amount.to_string(),
      "side": "onramp",
      "userAddress": self.config.deposit_address,
      "tokenAddress": self.config.token_address,
    });

    let body = self.send(self.request(Method::POST, "/swypt-onramp").json(&payload)).await?;
    let data = success_data(&body, "Failed to initiate M-Pesa payment")?;

    serde_json::from_value(data).map_err(|e| SwyptError::UnexpectedResponse(e.to_string()))
  }

  pub async fn quote(&self, request: &QuoteRequest) -> SwyptResult<Value> {
    self.send(self.request(Method::POST, "/swypt-quotes").json(request)).await
  }

  pub async fn offramp_quote(&self, request: &QuoteRequest) -> SwyptResult<Value> {
    let request = QuoteRequest {
      r#type: "offramp".to_string(),
      ..request.clone()
    };

    self.quote(&request).await
  }

  pub async fn supported_assets(&self) -> SwyptResult<Value> {
    self.send(self.request(Method::GET, "/swypt-supported-assets")).await
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

    self
      .http
      .request(method, url)
      .header(API_KEY_HEADER, &self.config.api_key)
      .header(API_SECRET_HEADER, &self.config.api_secret)
  }

  async fn send(&self, request: RequestBuilder) -> SwyptResult<Value> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.json::<Value>().await?;

    debug!("Swypt responded with {}: {}", status, body);

    Ok(body)
  }
}

#[async_trait]
impl OrderGateway for SwyptClient {
  #[instrument(skip(self))]
  async fn order_status(&self, order_id: &str) -> SwyptResult<OrderStatus> {
    let path = format!("/order-onramp-status/{order_id}");
    let body = self.send(self.request(Method::GET, &path)).await?;
    let data = success_data(&body, "Failed to check payment status")?;

    serde_json::from_value(data).map_err(|e| SwyptError::UnexpectedResponse(e.to_string()))
  }

  #[instrument(skip(self))]
  async fn crypto_transfer(&self, order_id: &str) -> SwyptResult<TransferReceipt> {
    let payload = json!({
      "chain": DEPOSIT_CHAIN,
      "address": self.config.deposit_address,
      "orderID": order_id,
      "project": DEPOSIT_PROJECT,
    });

    let body = self.send(self.request(Method::POST, "/swypt-deposit").json(&payload)).await?;

    if !is_success(&body) {
      return Err(SwyptError::Rejected(
        message_of(&body).unwrap_or_else(|| "Failed to process crypto transfer".to_string()),
      ));
    }

    serde_json::from_value(body).map_err(|e| SwyptError::UnexpectedResponse(e.to_string()))
  }
}

// Swypt reports success either as `"status": "success"` or as `"status": 200`.
fn is_success(body: &Value) -> bool {
  match body.get("status") {
    Some(Value::String(status)) => status == "success",
    Some(Value::Number(code)) => code.as_u64() == Some(200),
    _ => false,
  }
}

fn message_of(body: &Value) -> Option<String> {
  body.get("message").and_then(Value::as_str).map(str::to_owned)
}

fn success_data(body: &Value, fallback: &str) -> SwyptResult<Value> {
  if !is_success(body) {
    return Err(SwyptError::Rejected(message_of(body).unwrap_or_else(|| fallback.to_string())));
  }

  body
    .get("data")
    .cloned()
    .ok_or_else(|| SwyptError::UnexpectedResponse("missing `data` field".to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base_url: String) -> SwyptClient {
    SwyptClient::new(SwyptConfig {
      base_url,
      api_key: "key".to_string(),
      api_secret: "secret".to_string(),
      deposit_address: "0xdeposit".to_string(),
      token_address: "0xtoken".to_string(),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn test_initiate_onramp_normalizes_phone() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
      .mock("POST", "/swypt-onramp")
      .match_header("x-api-key", "key")
      .match_header("x-api-secret", "secret")
      .match_body(mockito::Matcher::PartialJson(json!({
        "partyA": "254712345678",
        "amount": "500",
        "side": "onramp",
        "userAddress": "0xdeposit",
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"status":"success","data":{"orderID":"ORD-1","message":"STK push sent"}}"#)
      .create_async()
      .await;

    let order = client(server.url()).initiate_onramp("0712345678", 500).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.order_id, "ORD-1");
    assert_eq!(order.message, "STK push sent");
  }

  #[tokio::test]
  async fn test_initiate_onramp_surfaces_rejection_message() {
    let mut server = mockito::Server::new_async().await;

    server
      .mock("POST", "/swypt-onramp")
      .with_status(400)
      .with_header("content-type", "application/json")
      .with_body(r#"{"status":"error","message":"Invalid phone"}"#)
      .create_async()
      .await;

    let err = client(server.url()).initiate_onramp("0712", 10).await.unwrap_err();

    assert!(matches!(err, SwyptError::Rejected(ref msg) if msg == "Invalid phone"));
  }

  #[tokio::test]
  async fn test_order_status_maps_unknown_states_to_pending() {
    let mut server = mockito::Server::new_async().await;

    server
      .mock("GET", "/order-onramp-status/ORD-1")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"status":"success","data":{"status":"PROCESSING","message":"waiting"}}"#)
      .create_async()
      .await;

    let status = client(server.url()).order_status("ORD-1").await.unwrap();

    assert_eq!(status.status, OrderState::Pending);
    assert_eq!(status.message, "waiting");
  }

  #[tokio::test]
  async fn test_crypto_transfer_accepts_numeric_status() {
    let mut server = mockito::Server::new_async().await;

    server
      .mock("POST", "/swypt-deposit")
      .match_body(mockito::Matcher::PartialJson(json!({"chain": "lisk", "orderID": "ORD-1"})))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"status":200,"hash":"0xabc","message":"Deposit complete"}"#)
      .create_async()
      .await;

    let receipt = client(server.url()).crypto_transfer("ORD-1").await.unwrap();

    assert_eq!(receipt.hash, "0xabc");
  }

  #[tokio::test]
  async fn test_offramp_quote_forces_type() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
      .mock("POST", "/swypt-quotes")
      .match_body(mockito::Matcher::PartialJson(json!({"type": "offramp", "fiatCurrency": "KES"})))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"status":"success","data":{"outputAmount":"1290.5"}}"#)
      .create_async()
      .await;

    let request = QuoteRequest {
      r#type: "onramp".to_string(),
      amount: "10".to_string(),
      fiat_currency: "KES".to_string(),
      crypto_currency: "USDT".to_string(),
      network: "lisk".to_string(),
      category: Some("B2C".to_string()),
    };
    let quote = client(server.url()).offramp_quote(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(quote["data"]["outputAmount"], "1290.5");
  }
}
