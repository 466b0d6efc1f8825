//! Event topic encoding and log decoding for the punk market contract.
//!
//! Only `PunkBought` is decoded:
//! topics = [topic0, punkIndex, fromAddress, toAddress], data = value.

use super::LedgerError;
use crate::domain::address::{keccak256, to_checksum};
use crate::domain::{Address, AssetId, EventFilter, EventKind, RawTradeEvent};
use serde_json::Value;
use tracing::warn;

/// topic0 for an event: `0x` + keccak256(signature).
pub fn event_topic(kind: EventKind) -> String {
    format!("0x{}", hex::encode(keccak256(kind.signature().as_bytes())))
}

/// Left-pad an address to a 32-byte topic word.
pub fn address_topic(address: &Address) -> String {
    format!("0x{:0>64}", address.bare_lowercase())
}

/// Topic list for `eth_getLogs`; `fromAddress` is topic 2 and `toAddress` topic 3.
pub fn filter_topics(kind: EventKind, filter: &EventFilter) -> Value {
    let topic0 = Value::String(event_topic(kind));
    match filter {
        EventFilter::Source(a) => {
            Value::Array(vec![topic0, Value::Null, Value::String(address_topic(a))])
        }
        EventFilter::Destination(a) => Value::Array(vec![
            topic0,
            Value::Null,
            Value::Null,
            Value::String(address_topic(a)),
        ]),
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn parse_hex_u128(s: &str) -> Option<u128> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u128::from_str_radix(digits, 16).ok()
}

/// Address held in the low 20 bytes of a topic word, checksum-cased.
fn topic_address(topic: &str) -> Option<Address> {
    let digits = topic.strip_prefix("0x").unwrap_or(topic);
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(Address::new(to_checksum(&digits[24..])))
}

/// Decode one `eth_getLogs` entry.
///
/// Position fields (hash, block, log index) are required; indexed arguments
/// are left as `None` when absent. A value word that is missing or does not
/// fit in 128 bits is also `None`, which exports as a zero price.
pub fn decode_log(log: &Value) -> Result<RawTradeEvent, LedgerError> {
    let transaction_id = log
        .get("transactionHash")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LedgerError::ParseError("Missing transactionHash field".to_string()))?
        .to_string();

    let block_number = log
        .get("blockNumber")
        .and_then(|v| v.as_str())
        .and_then(parse_hex_u64)
        .ok_or_else(|| LedgerError::ParseError("Missing blockNumber field".to_string()))?;

    let log_index = log
        .get("logIndex")
        .and_then(|v| v.as_str())
        .and_then(parse_hex_u64)
        .ok_or_else(|| LedgerError::ParseError("Missing logIndex field".to_string()))?;

    let topics: Vec<&str> = log
        .get("topics")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|t| t.as_str()).collect())
        .unwrap_or_default();

    let asset_id = topics.get(1).and_then(|t| parse_hex_u64(t)).map(AssetId::new);
    let source_address = topics.get(2).and_then(|t| topic_address(t));
    let destination_address = topics.get(3).and_then(|t| topic_address(t));

    let value = match log.get("data").and_then(|v| v.as_str()) {
        None | Some("0x") | Some("") => None,
        Some(data) => {
            let parsed = parse_hex_u128(data);
            if parsed.is_none() {
                warn!("Unreadable value in {}: {}", transaction_id, data);
            }
            parsed
        }
    };

    Ok(RawTradeEvent {
        transaction_id,
        log_index,
        block_number,
        asset_id,
        source_address,
        destination_address,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELLER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const BUYER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    fn topic_for(addr: &str) -> String {
        address_topic(&Address::new(addr.to_string()))
    }

    #[test]
    fn test_address_topic_padding() {
        let topic = topic_for(SELLER);
        assert_eq!(topic.len(), 66);
        assert!(topic.starts_with("0x000000000000000000000000"));
        assert!(topic.ends_with("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
    }

    #[test]
    fn test_punk_bought_topic0() {
        assert_eq!(
            event_topic(EventKind::PunkBought),
            "0x58e5d5a525e3b40bc15abaa38b5882678db1ee68befd2f60bafe3a7fd06db9e3"
        );
    }

    #[test]
    fn test_filter_topics_positions() {
        let wallet = Address::new(SELLER.to_string());
        let source = filter_topics(EventKind::PunkBought, &EventFilter::Source(wallet.clone()));
        let arr = source.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert!(arr[1].is_null());
        assert_eq!(arr[2].as_str().unwrap(), topic_for(SELLER));

        let dest = filter_topics(EventKind::PunkBought, &EventFilter::Destination(wallet));
        let arr = dest.as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert!(arr[2].is_null());
        assert_eq!(arr[3].as_str().unwrap(), topic_for(SELLER));
    }

    #[test]
    fn test_decode_log_valid() {
        let log = serde_json::json!({
            "transactionHash": "0xabc",
            "blockNumber": "0xbc614e",
            "logIndex": "0x1f",
            "topics": [
                event_topic(EventKind::PunkBought),
                "0x0000000000000000000000000000000000000000000000000000000000001e7c",
                topic_for(SELLER),
                topic_for(BUYER),
            ],
            "data": "0x0000000000000000000000000000000000000000000000e3aeb5737240a00000"
        });

        let event = decode_log(&log).unwrap();
        assert_eq!(event.transaction_id, "0xabc");
        assert_eq!(event.block_number, 12_345_678);
        assert_eq!(event.log_index, 31);
        assert_eq!(event.asset_id, Some(AssetId::new(7804)));
        assert_eq!(event.source_address.unwrap().as_str(), SELLER);
        assert_eq!(event.destination_address.unwrap().as_str(), BUYER);
        assert_eq!(event.value, Some(4_200_000_000_000_000_000_000));
    }

    #[test]
    fn test_decode_log_missing_topics_leaves_none() {
        let log = serde_json::json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x1",
            "logIndex": "0x0",
            "topics": [event_topic(EventKind::PunkBought)],
            "data": "0x"
        });

        let event = decode_log(&log).unwrap();
        assert_eq!(event.asset_id, None);
        assert_eq!(event.source_address, None);
        assert_eq!(event.destination_address, None);
        assert_eq!(event.value, None);
    }

    #[test]
    fn test_decode_log_oversized_value_leaves_none() {
        let log = serde_json::json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x1",
            "logIndex": "0x0",
            "topics": [
                event_topic(EventKind::PunkBought),
                "0x0000000000000000000000000000000000000000000000000000000000000001",
                topic_for(SELLER),
                topic_for(BUYER),
            ],
            "data": "0x0000000000000000000000000000000100000000000000000000000000000000"
        });

        let event = decode_log(&log).unwrap();
        assert_eq!(event.value, None);
        assert_eq!(event.asset_id, Some(AssetId::new(1)));
    }

    #[test]
    fn test_decode_log_missing_hash_errors() {
        let log = serde_json::json!({ "blockNumber": "0x1", "logIndex": "0x0" });
        assert!(matches!(decode_log(&log), Err(LedgerError::ParseError(_))));
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x0"), Some(0));
        assert_eq!(parse_hex_u64("0x10"), Some(16));
        assert_eq!(parse_hex_u64("0x"), None);
        assert_eq!(parse_hex_u64("0xzz"), None);
    }
}
