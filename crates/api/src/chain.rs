//! EIP-2612 permit payloads, IMARA contract calldata and the few JSON-RPC reads the staking flow
//! needs.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::{
  config::ChainSettings,
  error::{ApiError, ApiResult},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PERMIT_VERSION: &str = "1";
const NONCES_SELECTOR: &str = "7ecebe00";
const BALANCE_OF_SELECTOR: &str = "70a08231";
// depositWithPermit(address,uint256,uint256,uint8,bytes32,bytes32)
const DEPOSIT_WITH_PERMIT_SELECTOR: &str = "12a62cff";
// stake(uint256)
const STAKE_SELECTOR: &str = "a694fc3a";
// createProjectWithId(uint256,uint256)
const CREATE_PROJECT_SELECTOR: &str = "9853275c";
// setMilestones(uint256,uint256[],uint256[],address[],uint256[])
const SET_MILESTONES_SELECTOR: &str = "e1a12d04";
// completeMilestone(uint256,uint256)
const COMPLETE_MILESTONE_SELECTOR: &str = "f326206b";
// addFunds(uint256,uint256)
const ADD_FUNDS_SELECTOR: &str = "85f45250";
const WORD_BYTES: usize = 32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TypedField {
  pub name: String,
  pub r#type: String,
}

impl TypedField {
  fn new(name: &str, r#type: &str) -> Self {
    Self {
      name: name.to_string(),
      r#type: r#type.to_string(),
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermitDomain {
  pub name: String,
  pub version: String,
  pub chain_id: u64,
  pub verifying_contract: String,
}

/// Values are decimal strings so `uint256` amounts survive JSON untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct PermitMessage {
  pub owner: String,
  pub spender: String,
  pub value: String,
  pub nonce: String,
  pub deadline: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct PermitTypes {
  #[serde(rename = "EIP712Domain")]
  pub eip712_domain: Vec<TypedField>,
  #[serde(rename = "Permit")]
  pub permit: Vec<TypedField>,
}

/// Payload for `eth_signTypedData_v4`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermitTypedData {
  pub types: PermitTypes,
  pub domain: PermitDomain,
  pub primary_type: String,
  pub message: PermitMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitRequest {
  pub owner: String,
  pub spender: String,
  pub value: u128,
  pub nonce: u128,
  pub deadline: i64,
}

pub fn permit_typed_data(domain: PermitDomain, request: &PermitRequest) -> PermitTypedData {
  PermitTypedData {
    types: PermitTypes {
      eip712_domain: vec![
        TypedField::new("name", "string"),
        TypedField::new("version", "string"),
        TypedField::new("chainId", "uint256"),
        TypedField::new("verifyingContract", "address"),
      ],
      permit: vec![
        TypedField::new("owner", "address"),
        TypedField::new("spender", "address"),
        TypedField::new("value", "uint256"),
        TypedField::new("nonce", "uint256"),
        TypedField::new("deadline", "uint256"),
      ],
    },
    domain,
    primary_type: "Permit".to_string(),
    message: PermitMessage {
      owner: request.owner.clone(),
      spender: request.spender.clone(),
      value: request.value.to_string(),
      nonce: request.nonce.to_string(),
      deadline: request.deadline.to_string(),
    },
  }
}

pub fn permit_domain(settings: &ChainSettings) -> PermitDomain {
  PermitDomain {
    name: settings.token_name.clone(),
    version: PERMIT_VERSION.to_string(),
    chain_id: settings.chain_id,
    verifying_contract: settings.token_address.clone(),
  }
}

pub fn is_address(value: &str) -> bool {
  value
    .strip_prefix("0x")
    .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn is_transaction_hash(value: &str) -> bool {
  value
    .strip_prefix("0x")
    .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Parses a `0x`-prefixed quantity. Values wider than 128 bits saturate.
pub fn parse_quantity(raw: &str) -> ApiResult<u128> {
  let hex = raw
    .strip_prefix("0x")
    .ok_or_else(|| ApiError::Chain(format!("`{raw}` is not a hex quantity")))?;
  let digits = hex.trim_start_matches('0');

  if digits.is_empty() {
    return Ok(0);
  }
  if digits.len() > 32 {
    return Ok(u128::MAX);
  }

  u128::from_str_radix(digits, 16).map_err(|_| ApiError::Chain(format!("`{raw}` is not a hex quantity")))
}

fn call_data(selector: &str, address: &str) -> String {
  format!("0x{selector}{}", address_word(address))
}

fn address_word(address: &str) -> String {
  let address = address.trim_start_matches("0x").to_ascii_lowercase();
  format!("{address:0>64}")
}

fn uint_word(value: u128) -> String {
  format!("{value:064x}")
}

fn bytes32_word(value: &str) -> ApiResult<String> {
  match value.strip_prefix("0x") {
    Some(hex) if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) => Ok(hex.to_ascii_lowercase()),
    _ => Err(ApiError::InvalidInput(format!("`{value}` is not a bytes32 value"))),
  }
}

fn checked_address(value: &str) -> ApiResult<String> {
  if !is_address(value) {
    return Err(ApiError::InvalidInput(format!("`{value}` is not an address")));
  }

  Ok(address_word(value))
}

/// Identifies a project or milestone on chain by its 128-bit UUID value.
pub fn chain_id_of(id: uuid::Uuid) -> u128 {
  id.as_u128()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneAllocation {
  pub milestone_id: u128,
  pub budget: u128,
  pub recipient: String,
  pub percentage: u128,
}

/// Calls on the staking and project contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
  DepositWithPermit {
    token: String,
    amount: u128,
    deadline: u128,
    v: u8,
    r: String,
    s: String,
  },
  Stake {
    amount: u128,
  },
  CreateProjectWithId {
    project_id: u128,
    amount: u128,
  },
  SetMilestones {
    project_id: u128,
    milestones: Vec<MilestoneAllocation>,
  },
  CompleteMilestone {
    project_id: u128,
    milestone_id: u128,
  },
  AddFunds {
    project_id: u128,
    amount: u128,
  },
}

impl ContractCall {
  pub fn selector(&self) -> &'static str {
    match self {
      ContractCall::DepositWithPermit { .. } => DEPOSIT_WITH_PERMIT_SELECTOR,
      ContractCall::Stake { .. } => STAKE_SELECTOR,
      ContractCall::CreateProjectWithId { .. } => CREATE_PROJECT_SELECTOR,
      ContractCall::SetMilestones { .. } => SET_MILESTONES_SELECTOR,
      ContractCall::CompleteMilestone { .. } => COMPLETE_MILESTONE_SELECTOR,
      ContractCall::AddFunds { .. } => ADD_FUNDS_SELECTOR,
    }
  }

  /// ABI-encoded calldata, `0x`-prefixed.
  pub fn encode(&self) -> ApiResult<String> {
    let words = match self {
      ContractCall::DepositWithPermit {
        token,
        amount,
        deadline,
        v,
        r,
        s,
      } => vec![
        checked_address(token)?,
        uint_word(*amount),
        uint_word(*deadline),
        uint_word(u128::from(*v)),
        bytes32_word(r)?,
        bytes32_word(s)?,
      ],
      ContractCall::Stake { amount } => vec![uint_word(*amount)],
      ContractCall::CreateProjectWithId { project_id, amount } | ContractCall::AddFunds { project_id, amount } => {
        vec![uint_word(*project_id), uint_word(*amount)]
      },
      ContractCall::CompleteMilestone {
        project_id,
        milestone_id,
      } => vec![uint_word(*project_id), uint_word(*milestone_id)],
      ContractCall::SetMilestones { project_id, milestones } => set_milestones_words(*project_id, milestones)?,
    };

    Ok(format!("0x{}{}", self.selector(), words.concat()))
  }
}

// Head: project id plus one offset per array. Tail: each array as length then items.
fn set_milestones_words(project_id: u128, milestones: &[MilestoneAllocation]) -> ApiResult<Vec<String>> {
  const ARRAYS: usize = 4;

  let array_bytes = WORD_BYTES * (1 + milestones.len());
  let head_bytes = WORD_BYTES * (1 + ARRAYS);

  let mut words = vec![uint_word(project_id)];
  words.extend((0..ARRAYS).map(|index| uint_word((head_bytes + index * array_bytes) as u128)));

  let length = uint_word(milestones.len() as u128);

  words.push(length.clone());
  words.extend(milestones.iter().map(|m| uint_word(m.milestone_id)));
  words.push(length.clone());
  words.extend(milestones.iter().map(|m| uint_word(m.budget)));
  words.push(length.clone());
  for milestone in milestones {
    words.push(checked_address(&milestone.recipient)?);
  }
  words.push(length);
  words.extend(milestones.iter().map(|m| uint_word(m.percentage)));

  Ok(words)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeFunction {
  DepositWithPermit,
  Stake,
}

/// Staking function a transaction's input calls, if any.
pub fn stake_function(input: &str) -> Option<StakeFunction> {
  let selector = input.strip_prefix("0x")?.get(..8)?.to_ascii_lowercase();

  match selector.as_str() {
    DEPOSIT_WITH_PERMIT_SELECTOR => Some(StakeFunction::DepositWithPermit),
    STAKE_SELECTOR => Some(StakeFunction::Stake),
    _ => None,
  }
}

/// A mined transaction as far as stake verification cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedTransaction {
  pub from: String,
  /// `None` for contract creations.
  pub to: Option<String>,
  pub input: String,
  pub succeeded: bool,
}

impl MinedTransaction {
  pub fn sent_to(&self, address: &str) -> bool {
    self.to.as_deref().is_some_and(|to| to.eq_ignore_ascii_case(address))
  }

  pub fn sent_from(&self, address: &str) -> bool {
    self.from.eq_ignore_ascii_case(address)
  }
}

fn str_field<'a>(value: &'a Value, field: &str) -> ApiResult<&'a str> {
  value
    .get(field)
    .and_then(Value::as_str)
    .ok_or_else(|| ApiError::Chain(format!("transaction has no `{field}`")))
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
  result: Option<Value>,
  error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
  code: i64,
  message: String,
}

/// Minimal JSON-RPC client for an EVM node.
#[derive(Debug, Clone)]
pub struct ChainClient {
  http: Client,
  rpc_url: String,
}

impl ChainClient {
  pub fn new(rpc_url: impl Into<String>) -> ApiResult<Self> {
    let http = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| ApiError::Chain(e.to_string()))?;

    Ok(Self {
      http,
      rpc_url: rpc_url.into(),
    })
  }

  #[instrument(skip(self))]
  pub async fn nonce_of(&self, token: &str, owner: &str) -> ApiResult<u128> {
    let result = self.eth_call(token, call_data(NONCES_SELECTOR, owner)).await?;
    parse_quantity(&result)
  }

  #[instrument(skip(self))]
  pub async fn balance_of(&self, token: &str, owner: &str) -> ApiResult<u128> {
    let result = self.eth_call(token, call_data(BALANCE_OF_SELECTOR, owner)).await?;
    parse_quantity(&result)
  }

  /// `None` while the transaction has no receipt yet.
  #[instrument(skip(self))]
  pub async fn transaction(&self, tx_hash: &str) -> ApiResult<Option<MinedTransaction>> {
    let (receipt, transaction) = tokio::try_join!(
      self.request("eth_getTransactionReceipt", json!([tx_hash])),
      self.request("eth_getTransactionByHash", json!([tx_hash])),
    )?;

    if receipt.is_null() || transaction.is_null() {
      return Ok(None);
    }

    let status = parse_quantity(str_field(&receipt, "status")?)?;

    Ok(Some(MinedTransaction {
      from: str_field(&receipt, "from")?.to_string(),
      to: receipt.get("to").and_then(Value::as_str).map(str::to_owned),
      input: str_field(&transaction, "input")?.to_string(),
      succeeded: status == 1,
    }))
  }

  async fn eth_call(&self, to: &str, data: String) -> ApiResult<String> {
    let result = self
      .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
      .await?;

    result
      .as_str()
      .map(str::to_owned)
      .ok_or_else(|| ApiError::Chain(format!("unexpected eth_call result {result}")))
  }

  async fn request(&self, method: &str, params: Value) -> ApiResult<Value> {
    let payload = json!({
      "jsonrpc": "2.0",
      "id": 1,
      "method": method,
      "params": params,
    });

    let response = self
      .http
      .post(&self.rpc_url)
      .json(&payload)
      .send()
      .await
      .map_err(|e| ApiError::Chain(e.to_string()))?
      .json::<RpcResponse>()
      .await
      .map_err(|e| ApiError::Chain(e.to_string()))?;

    debug!("{} returned {:?}", method, response);

    if let Some(error) = response.error {
      return Err(ApiError::Chain(format!("{} ({})", error.message, error.code)));
    }

    Ok(response.result.unwrap_or(Value::Null))
  }
}
