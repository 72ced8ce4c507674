// src/rpc.rs
use alloy::primitives::{Address, U256};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, ViewError};

const ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorObject {
    fn is_revert(&self) -> bool {
        self.code == 3 || self.message.contains("execution reverted")
    }

    fn into_error(self) -> ViewError {
        if self.is_revert() {
            let reason = self
                .data
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(self.message);
            ViewError::Reverted(reason)
        } else {
            ViewError::Rpc(format!("{} (code {})", self.message, self.code))
        }
    }
}

/// JSON-RPC transport for one network
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// POST a request, retrying transport failures only. A `null` result is `None`.
    async fn request_value(&self, method: &str, params: Value) -> Result<Option<Value>> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut attempt = 1;
        let text = loop {
            debug!("Sending {} → {}", method, self.url);
            match self.client.post(&self.url).json(&payload).send().await {
                Ok(resp) => {
                    if resp.status() != StatusCode::OK {
                        return Err(ViewError::Rpc(format!("HTTP {}", resp.status())));
                    }
                    break resp.text().await?;
                }
                Err(e) if attempt < ATTEMPTS => {
                    warn!("{} request failed (attempt {}): {}. Retrying...", method, attempt, e);
                    attempt += 1;
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        parse_response(&text)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let value = self.request_value(method, params).await?;
        decode_result(value)
    }

    pub async fn block_number(&self) -> Result<u64> {
        let hex_number: String = self.request("eth_blockNumber", json!([])).await?;
        u64::from_str_radix(hex_number.trim_start_matches("0x"), 16)
            .map_err(|_| ViewError::Decode("block number"))
    }

    /// Read-only call against the latest block; returns the raw return data.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        let params = json!([
            { "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let result: String = self.request("eth_call", params).await?;
        hex::decode(result.trim_start_matches("0x")).map_err(|_| ViewError::Decode("call result"))
    }
}

impl RpcClient {
    /// Gas units for a transaction from `from`; reverts surface as `Reverted`.
    pub async fn estimate_gas(&self, from: Address, to: Address, data: &[u8]) -> Result<U256> {
        let params = json!([{
            "from": from.to_string(),
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        }]);
        let quantity: String = self.request("eth_estimateGas", params).await?;
        parse_quantity(&quantity)
    }

    pub async fn gas_price(&self) -> Result<U256> {
        let quantity: String = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&quantity)
    }
}

fn parse_quantity(quantity: &str) -> Result<U256> {
    quantity
        .parse::<U256>()
        .map_err(|_| ViewError::Decode("hex quantity"))
}

/// Receipt of a mined transaction
#[derive(Debug, Deserialize)]
pub struct Receipt {
    pub status: Option<String>,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }
}

impl RpcClient {
    /// Broadcast an already-signed transaction; returns its hash
    pub async fn send_raw_transaction(&self, signed: &[u8]) -> Result<String> {
        self.request(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(signed))]),
        )
        .await
    }

    pub async fn transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>> {
        match self.request_value("eth_getTransactionReceipt", json!([hash])).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

fn parse_response(text: &str) -> Result<Option<Value>> {
    let parsed: RpcResponse<Value> = serde_json::from_str(text)?;
    if let Some(error) = parsed.error {
        return Err(error.into_error());
    }
    Ok(parsed.result)
}

fn decode_result<T: DeserializeOwned>(value: Option<Value>) -> Result<T> {
    let value = value.ok_or_else(|| ViewError::Rpc("empty result".into()))?;
    Ok(serde_json::from_value(value)?)
}
