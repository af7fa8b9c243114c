//! Lightweight EVM JSON-RPC chain source
//!
//! A minimal client that implements only the reads the pipeline needs,
//! avoiding a full web3 dependency chain. Point-in-time state reads for one
//! wrapper go out as a single JSON-RPC batch keyed by block; responses are
//! matched back to requests by id, never by arrival order.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::RpcConfig;
use crate::core::error::SourceError;
use crate::core::traits::ChainDataSource;
use crate::core::types::FeeEvent;

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
/// balanceOf(address)
const SELECTOR_BALANCE_OF: &str = "0x70a08231";
/// totalSupply()
const SELECTOR_TOTAL_SUPPLY: &str = "0x18160ddd";
/// decimals()
const SELECTOR_DECIMALS: &str = "0x313ce567";

/// Lightweight JSON-RPC client implementing [`ChainDataSource`].
pub struct EvmRpcClient {
    url: String,
    rewards: String,
    oracle: String,
    price_selector: String,
    oracle_scale: f64,
    agent: ureq::Agent,
    /// Vault share scale (10^decimals), resolved once per vault.
    scale_cache: Mutex<HashMap<String, f64>>,
}

impl EvmRpcClient {
    pub fn new(config: &RpcConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(config.timeout_secs))
            .build();

        Self {
            url: config.endpoint.clone(),
            rewards: config.rewards.clone(),
            oracle: config.oracle.clone(),
            price_selector: config.price_selector.clone(),
            oracle_scale: 10f64.powi(config.oracle_decimals as i32),
            agent,
            scale_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn post(&self, body: Value) -> Result<Value, SourceError> {
        debug!(url = %self.url, "rpc post");
        // ureq is sync, so the call runs on the blocking pool.
        let response_body = tokio::task::spawn_blocking({
            let agent = self.agent.clone();
            let url = self.url.clone();
            let body = body.to_string();

            move || {
                let response = agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .send_string(&body)
                    .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
                response
                    .into_string()
                    .map_err(|e| SourceError::ConnectionFailed(e.to_string()))
            }
        })
        .await
        .map_err(|e| SourceError::ConnectionFailed(e.to_string()))??;

        serde_json::from_str(&response_body).map_err(SourceError::from)
    }

    /// Single JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value, SourceError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self.post(body).await?;
        extract_result(&response)
    }

    /// Batched `eth_call`s, one HTTP round trip, results realigned by id.
    async fn batch_call(&self, calls: &[(String, String, u64)]) -> Result<Vec<Value>, SourceError> {
        let requests: Vec<Value> = calls
            .iter()
            .enumerate()
            .map(|(id, (to, data, block))| {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": "eth_call",
                    "params": [{"to": to, "data": data}, format!("0x{block:x}")],
                })
            })
            .collect();

        let response = self.post(Value::Array(requests)).await?;
        let entries = response
            .as_array()
            .ok_or_else(|| SourceError::MalformedResponse("batch response is not an array".into()))?;
        if entries.len() != calls.len() {
            return Err(SourceError::BatchShape {
                expected: calls.len(),
                got: entries.len(),
            });
        }

        let mut results = vec![Value::Null; calls.len()];
        for entry in entries {
            let id = entry["id"].as_u64().ok_or_else(|| {
                SourceError::MalformedResponse("batch entry missing id".into())
            })? as usize;
            if id >= results.len() {
                return Err(SourceError::MalformedResponse(format!(
                    "batch entry id {id} out of range"
                )));
            }
            results[id] = extract_result(entry)?;
        }
        Ok(results)
    }

    /// Vault share scale, cached per vault for the client's lifetime.
    async fn scale(&self, vault: &str) -> Result<f64, SourceError> {
        {
            let cache = self.scale_cache.lock().await;
            if let Some(scale) = cache.get(vault) {
                return Ok(*scale);
            }
        }
        let result = self
            .call(
                "eth_call",
                json!([{"to": vault, "data": SELECTOR_DECIMALS}, "latest"]),
            )
            .await?;
        let decimals = hex_to_u64(result.as_str().unwrap_or_default())?;
        let scale = 10f64.powi(decimals as i32);
        self.scale_cache
            .lock()
            .await
            .insert(vault.to_string(), scale);
        Ok(scale)
    }
}

#[async_trait]
impl ChainDataSource for EvmRpcClient {
    /// Fees are vault share transfers from the vault to the rewards address
    /// at harvest time.
    async fn fee_events(&self, vault: &str, _wrapper: &str) -> Result<Vec<FeeEvent>, SourceError> {
        let scale = self.scale(vault).await?;
        let params = json!([{
            "address": vault,
            "fromBlock": "0x0",
            "toBlock": "latest",
            "topics": [TRANSFER_TOPIC, pad_address(vault)?, pad_address(&self.rewards)?],
        }]);
        let logs = self.call("eth_getLogs", params).await?;
        let logs = logs
            .as_array()
            .ok_or_else(|| SourceError::MalformedResponse("eth_getLogs result is not an array".into()))?;

        // Last log wins on a duplicate block, then sort: callers get a
        // block-ordered, block-deduplicated series.
        let mut by_block: HashMap<u64, f64> = HashMap::with_capacity(logs.len());
        for log in logs {
            let block = hex_to_u64(log["blockNumber"].as_str().unwrap_or_default())?;
            let value = hex_to_f64(log["data"].as_str().unwrap_or_default())?;
            by_block.insert(block, value / scale);
        }
        let mut events: Vec<FeeEvent> = by_block
            .into_iter()
            .map(|(block, protocol_fee)| FeeEvent {
                block,
                protocol_fee,
            })
            .collect();
        events.sort_by_key(|e| e.block);
        Ok(events)
    }

    async fn balances_at(
        &self,
        vault: &str,
        holder: &str,
        blocks: &[u64],
    ) -> Result<Vec<f64>, SourceError> {
        let scale = self.scale(vault).await?;
        let data = format!(
            "{SELECTOR_BALANCE_OF}{}",
            pad_address(holder)?.trim_start_matches("0x")
        );
        let calls: Vec<(String, String, u64)> = blocks
            .iter()
            .map(|block| (vault.to_string(), data.clone(), *block))
            .collect();
        let results = self.batch_call(&calls).await?;
        results
            .iter()
            .map(|v| Ok(hex_to_f64(v.as_str().unwrap_or_default())? / scale))
            .collect()
    }

    async fn total_supplies_at(
        &self,
        vault: &str,
        blocks: &[u64],
    ) -> Result<Vec<f64>, SourceError> {
        let scale = self.scale(vault).await?;
        let calls: Vec<(String, String, u64)> = blocks
            .iter()
            .map(|block| (vault.to_string(), SELECTOR_TOTAL_SUPPLY.to_string(), *block))
            .collect();
        let results = self.batch_call(&calls).await?;
        results
            .iter()
            .map(|v| Ok(hex_to_f64(v.as_str().unwrap_or_default())? / scale))
            .collect()
    }

    async fn price_usd(&self, vault: &str, block: u64) -> Result<f64, SourceError> {
        let data = format!(
            "{}{}",
            self.price_selector,
            pad_address(vault)?.trim_start_matches("0x")
        );
        let result = self
            .call(
                "eth_call",
                json!([{"to": self.oracle, "data": data}, format!("0x{block:x}")]),
            )
            .await?;
        Ok(hex_to_f64(result.as_str().unwrap_or_default())? / self.oracle_scale)
    }

    async fn block_timestamp(&self, block: u64) -> Result<i64, SourceError> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("0x{block:x}"), false]),
            )
            .await?;
        let timestamp = hex_to_u64(result["timestamp"].as_str().unwrap_or_default())?;
        Ok(timestamp as i64)
    }
}

fn extract_result(response: &Value) -> Result<Value, SourceError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        return Err(SourceError::Rpc {
            code: error["code"].as_i64().unwrap_or(0),
            message: error["message"].as_str().unwrap_or("unknown").to_string(),
        });
    }
    response
        .get("result")
        .filter(|r| !r.is_null())
        .cloned()
        .ok_or_else(|| SourceError::MalformedResponse("no result in rpc response".into()))
}

/// Left-pad a 20-byte address to a 32-byte topic / calldata word.
fn pad_address(address: &str) -> Result<String, SourceError> {
    let hex = address.trim_start_matches("0x");
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SourceError::MalformedResponse(format!(
            "invalid address: {address}"
        )));
    }
    Ok(format!("0x{:0>64}", hex.to_lowercase()))
}

fn hex_to_u64(hex: &str) -> Result<u64, SourceError> {
    let digits = hex.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|_| SourceError::MalformedResponse(format!("invalid hex quantity: {hex}")))
}

/// Parse an unsigned 256-bit hex word into f64. Token amounts lose precision
/// past 2^53, which is acceptable for reporting-grade USD math.
fn hex_to_f64(hex: &str) -> Result<f64, SourceError> {
    let digits = hex.trim_start_matches("0x");
    let mut value = 0.0f64;
    for c in digits.chars() {
        let digit = c
            .to_digit(16)
            .ok_or_else(|| SourceError::MalformedResponse(format!("invalid hex word: {hex}")))?;
        value = value * 16.0 + digit as f64;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_addresses_to_32_bytes() {
        let topic = pad_address("0x5f18C75AbDAe578b483E5F43f12a39cF75b973a9").unwrap();
        assert_eq!(topic.len(), 66);
        assert!(topic.starts_with("0x000000000000000000000000"));
        assert!(topic.ends_with("5f18c75abdae578b483e5f43f12a39cf75b973a9"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(pad_address("0x1234").is_err());
        assert!(pad_address("not-an-address").is_err());
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(hex_to_u64("0x0").unwrap(), 0);
        assert_eq!(hex_to_u64("0x").unwrap(), 0);
        assert_eq!(hex_to_u64("0x60d4e0").unwrap(), 6_345_952);
        assert!(hex_to_u64("0xzz").is_err());
    }

    #[test]
    fn parses_256_bit_words() {
        assert_eq!(hex_to_f64("0x0").unwrap(), 0.0);
        assert_eq!(hex_to_f64("0xde0b6b3a7640000").unwrap(), 1e18);
        let word = format!("0x{:0>64}", "de0b6b3a7640000");
        assert_eq!(hex_to_f64(&word).unwrap(), 1e18);
    }

    #[test]
    fn extracts_rpc_errors() {
        let response = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "header not found"}});
        match extract_result(&response) {
            Err(SourceError::Rpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "header not found");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }
}
