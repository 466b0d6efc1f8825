//! Ledger abstraction for reading historical contract events from a chain node.

use crate::domain::{BlockRange, EventFilter, EventKind, RawTradeEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

pub mod abi;
pub mod mock;
pub mod rpc;

pub use mock::{MockLedger, QueryRecord};
pub use rpc::JsonRpcLedger;

/// Header fields of a block that the collector needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub timestamp: DateTime<Utc>,
}

/// Read-only view of the remote ledger.
///
/// `query_events` issues exactly one provider request and surfaces every
/// failure; range shrinking and retrying belong to the caller. The other
/// methods may retry transient failures internally.
#[async_trait]
pub trait Ledger: Send + Sync + fmt::Debug {
    /// Latest block number known to the node.
    async fn latest_block(&self) -> Result<u64, LedgerError>;

    /// Fetch events of `kind` matching `filter` within the inclusive `range`.
    ///
    /// # Returns
    /// Events ordered by (block_number, log_index)
    async fn query_events(
        &self,
        kind: EventKind,
        filter: &EventFilter,
        range: BlockRange,
    ) -> Result<Vec<RawTradeEvent>, LedgerError>;

    /// Fetch the header of a block.
    async fn get_block(&self, block_number: u64) -> Result<BlockHeader, LedgerError>;

    /// Whether the node answers at all.
    async fn is_connected(&self) -> bool;
}

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network error (e.g., connection refused, DNS failure)
    NetworkError(String),
    /// Request timed out
    Timeout,
    /// HTTP error (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// Rate limit exceeded
    RateLimited,
    /// Provider refused the block span or result size
    RangeTooLarge(String),
    /// JSON-RPC error object not covered above
    Rpc { code: i64, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
}

impl LedgerError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::NetworkError(_)
            | LedgerError::Timeout
            | LedgerError::RateLimited
            | LedgerError::RangeTooLarge(_) => true,
            LedgerError::HttpError { status, .. } => *status >= 500,
            LedgerError::Rpc { .. } | LedgerError::ParseError(_) => false,
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LedgerError::Timeout => write!(f, "Request timed out"),
            LedgerError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            LedgerError::RateLimited => write!(f, "Rate limited"),
            LedgerError::RangeTooLarge(msg) => write!(f, "Range too large: {}", msg),
            LedgerError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            LedgerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::NetworkError("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = LedgerError::HttpError {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 502: Bad gateway");

        let err = LedgerError::RangeTooLarge("query returned more than 10000 results".to_string());
        assert_eq!(
            err.to_string(),
            "Range too large: query returned more than 10000 results"
        );

        let err = LedgerError::Rpc {
            code: -32602,
            message: "invalid params".to_string(),
        };
        assert_eq!(err.to_string(), "RPC error -32602: invalid params");
    }

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::Timeout.is_transient());
        assert!(LedgerError::RateLimited.is_transient());
        assert!(LedgerError::RangeTooLarge(String::new()).is_transient());
        assert!(LedgerError::HttpError {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!LedgerError::HttpError {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!LedgerError::ParseError(String::new()).is_transient());
    }
}
