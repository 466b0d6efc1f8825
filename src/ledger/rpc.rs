//! Ethereum JSON-RPC ledger client.

use super::abi::{decode_log, filter_topics, parse_hex_u64};
use super::{BlockHeader, Ledger, LedgerError};
use crate::domain::{Address, BlockRange, EventFilter, EventKind, RawTradeEvent};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request HTTP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Ledger backed by a JSON-RPC endpoint, scoped to one contract.
#[derive(Debug, Clone)]
pub struct JsonRpcLedger {
    client: Client,
    url: String,
    contract: Address,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcLedger {
    /// Create a new JSON-RPC ledger for `contract` at `url`.
    pub fn new(url: String, contract: Address) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url,
            contract,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Issue a single JSON-RPC request without retrying.
    async fn send_once(&self, method: &str, params: &Value) -> Result<Value, LedgerError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout
                } else {
                    LedgerError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == 429 {
            return Err(LedgerError::RateLimited);
        }
        if !status.is_success() {
            return Err(LedgerError::HttpError {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unexpected status")
                    .to_string(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| LedgerError::ParseError(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(classify_rpc_error(error));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::ParseError("Missing result field".to_string()))
    }

    /// Issue a request, retrying transient failures with exponential backoff.
    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            self.send_once(method, &params).await.map_err(|e| {
                if e.is_transient() {
                    debug!("{} failed, retrying: {}", method, e);
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }
}

/// Map a JSON-RPC error object onto the ledger error taxonomy.
///
/// Providers disagree on codes for oversized `eth_getLogs` requests, so
/// the message text is inspected as well.
fn classify_rpc_error(error: &Value) -> LedgerError {
    let code = error.get("code").and_then(|v| v.as_i64()).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();
    let lowered = message.to_ascii_lowercase();

    if code == 429 || lowered.contains("rate limit") || lowered.contains("too many requests") {
        return LedgerError::RateLimited;
    }
    if lowered.contains("timeout") || lowered.contains("timed out") {
        return LedgerError::Timeout;
    }
    if code == -32005
        || lowered.contains("more than")
        || lowered.contains("block range")
        || lowered.contains("range too large")
        || lowered.contains("response size")
    {
        return LedgerError::RangeTooLarge(message);
    }
    LedgerError::Rpc { code, message }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn latest_block(&self) -> Result<u64, LedgerError> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        result
            .as_str()
            .and_then(parse_hex_u64)
            .ok_or_else(|| LedgerError::ParseError(format!("Invalid block number: {}", result)))
    }

    async fn query_events(
        &self,
        kind: EventKind,
        filter: &EventFilter,
        range: BlockRange,
    ) -> Result<Vec<RawTradeEvent>, LedgerError> {
        debug!("eth_getLogs {} {} blocks {}", kind, filter, range);

        let params = serde_json::json!([{
            "address": self.contract.as_str(),
            "fromBlock": format!("0x{:x}", range.from_block),
            "toBlock": format!("0x{:x}", range.to_block),
            "topics": filter_topics(kind, filter),
        }]);

        let result = self.send_once("eth_getLogs", &params).await?;
        let logs = result
            .as_array()
            .ok_or_else(|| LedgerError::ParseError("Expected array response".to_string()))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match decode_log(log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Failed to decode log: {}", e);
                }
            }
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));

        Ok(events)
    }

    async fn get_block(&self, block_number: u64) -> Result<BlockHeader, LedgerError> {
        debug!("Fetching block {}", block_number);

        let result = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([format!("0x{:x}", block_number), false]),
            )
            .await?;
        if result.is_null() {
            return Err(LedgerError::ParseError(format!(
                "Block {} not found",
                block_number
            )));
        }

        let secs = result
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(parse_hex_u64)
            .ok_or_else(|| LedgerError::ParseError("Missing timestamp field".to_string()))?;
        let timestamp = Utc
            .timestamp_opt(secs as i64, 0)
            .single()
            .ok_or_else(|| LedgerError::ParseError(format!("Invalid timestamp {}", secs)))?;

        Ok(BlockHeader { timestamp })
    }

    async fn is_connected(&self) -> bool {
        match self.send_once("eth_chainId", &serde_json::json!([])).await {
            Ok(chain_id) => {
                debug!("Connected to chain {}", chain_id);
                true
            }
            Err(e) => {
                warn!("Ledger connectivity check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_range_too_large() {
        let err = classify_rpc_error(&serde_json::json!({
            "code": -32005,
            "message": "query returned more than 10000 results"
        }));
        assert!(matches!(err, LedgerError::RangeTooLarge(_)));

        let err = classify_rpc_error(&serde_json::json!({
            "code": -32600,
            "message": "eth_getLogs is limited to a 10,000 block range"
        }));
        assert!(matches!(err, LedgerError::RangeTooLarge(_)));
    }

    #[test]
    fn test_classify_rate_limited() {
        let err = classify_rpc_error(&serde_json::json!({
            "code": 429,
            "message": "Too Many Requests"
        }));
        assert_eq!(err, LedgerError::RateLimited);
    }

    #[test]
    fn test_classify_timeout() {
        let err = classify_rpc_error(&serde_json::json!({
            "code": -32000,
            "message": "request timed out"
        }));
        assert_eq!(err, LedgerError::Timeout);
    }

    #[test]
    fn test_classify_other_rpc_error() {
        let err = classify_rpc_error(&serde_json::json!({
            "code": -32602,
            "message": "invalid argument 0"
        }));
        assert_eq!(
            err,
            LedgerError::Rpc {
                code: -32602,
                message: "invalid argument 0".to_string()
            }
        );
        assert!(!err.is_transient());
    }
}
