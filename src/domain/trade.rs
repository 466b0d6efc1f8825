//! Trade records: the raw ledger event and its normalized, exportable form.

use crate::domain::{Address, AssetId, Decimal, EventKind, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decoded contract log as emitted by the ledger.
///
/// Indexed arguments the log did not carry are `None`; the collector
/// decides whether the event is still usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTradeEvent {
    pub transaction_id: String,
    /// Position of the log within its block; together with the
    /// transaction id it identifies the event uniquely.
    pub log_index: u64,
    pub block_number: u64,
    pub asset_id: Option<AssetId>,
    pub source_address: Option<Address>,
    pub destination_address: Option<Address>,
    /// Sale value in wei.
    pub value: Option<u128>,
}

impl RawTradeEvent {
    /// Stable identity of the event across overlapping queries.
    pub fn event_key(&self) -> (String, u64) {
        (self.transaction_id.to_ascii_lowercase(), self.log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("event {tx} is missing field {field}")]
    MissingField { tx: String, field: &'static str },
    #[error("event {tx} has an out-of-range value: {reason}")]
    InvalidValue { tx: String, reason: String },
}

/// A trade as seen from one wallet's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTrade {
    pub asset_id: AssetId,
    pub wallet_address: Address,
    pub role: Role,
    pub event_kind: EventKind,
    pub transaction_id: String,
    pub source_address: Address,
    pub destination_address: Address,
    /// Price in ETH.
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl NormalizedTrade {
    /// Build a normalized trade for `wallet` from a raw event and its block timestamp.
    ///
    /// A missing value is treated as a zero-price transfer.
    pub fn from_raw(
        raw: &RawTradeEvent,
        wallet: &Address,
        kind: EventKind,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, NormalizeError> {
        let missing = |field| NormalizeError::MissingField {
            tx: raw.transaction_id.clone(),
            field,
        };
        let asset_id = raw.asset_id.ok_or_else(|| missing("asset_id"))?;
        let source = raw
            .source_address
            .clone()
            .ok_or_else(|| missing("source_address"))?;
        let destination = raw
            .destination_address
            .clone()
            .ok_or_else(|| missing("destination_address"))?;

        let price = match raw.value {
            Some(wei) => Decimal::from_wei(wei).map_err(|e| NormalizeError::InvalidValue {
                tx: raw.transaction_id.clone(),
                reason: e.to_string(),
            })?,
            None => Decimal::zero(),
        };

        Ok(NormalizedTrade {
            asset_id,
            wallet_address: wallet.clone(),
            role: Role::resolve(wallet, &source, &destination),
            event_kind: kind,
            transaction_id: raw.transaction_id.clone(),
            source_address: source,
            destination_address: destination,
            price,
            timestamp,
        })
    }
}

/// Export ordering: (asset_id, wallet_address, timestamp ascending).
pub fn sort_trades_for_export(trades: &mut [NormalizedTrade]) {
    trades.sort_by(|a, b| {
        a.asset_id
            .cmp(&b.asset_id)
            .then_with(|| a.wallet_address.cmp(&b.wallet_address))
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WALLET: &str = "0x00000000000000000000000000000000000000aa";
    const OTHER: &str = "0x00000000000000000000000000000000000000bb";

    fn raw() -> RawTradeEvent {
        RawTradeEvent {
            transaction_id: "0xfeed".to_string(),
            log_index: 3,
            block_number: 100,
            asset_id: Some(AssetId::new(7804)),
            source_address: Some(Address::new(OTHER.to_string())),
            destination_address: Some(Address::new(WALLET.to_string())),
            value: Some(4_200_000_000_000_000_000_000),
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 11, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_from_raw_buyer() {
        let wallet = Address::new(WALLET.to_string());
        let trade = NormalizedTrade::from_raw(&raw(), &wallet, EventKind::PunkBought, ts()).unwrap();
        assert_eq!(trade.role, Role::Buyer);
        assert_eq!(trade.asset_id, AssetId::new(7804));
        assert_eq!(trade.price.to_canonical_string(), "4200");
        assert_eq!(trade.timestamp, ts());
    }

    #[test]
    fn test_from_raw_missing_value_is_zero_price() {
        let wallet = Address::new(OTHER.to_string());
        let mut event = raw();
        event.value = None;
        let trade = NormalizedTrade::from_raw(&event, &wallet, EventKind::PunkBought, ts()).unwrap();
        assert_eq!(trade.role, Role::Seller);
        assert!(trade.price.is_zero());
    }

    #[test]
    fn test_from_raw_missing_address_errors() {
        let wallet = Address::new(WALLET.to_string());
        let mut event = raw();
        event.destination_address = None;
        let err = NormalizedTrade::from_raw(&event, &wallet, EventKind::PunkBought, ts()).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingField {
                tx: "0xfeed".to_string(),
                field: "destination_address"
            }
        );
    }

    #[test]
    fn test_event_key_ignores_hash_case() {
        let mut a = raw();
        let b = raw();
        a.transaction_id = "0xFEED".to_string();
        assert_eq!(a.event_key(), b.event_key());
    }

    #[test]
    fn test_sort_trades_for_export() {
        let wallet = Address::new(WALLET.to_string());
        let mut later = NormalizedTrade::from_raw(&raw(), &wallet, EventKind::PunkBought, ts()).unwrap();
        later.timestamp = ts() + chrono::Duration::days(1);
        let earlier = NormalizedTrade::from_raw(&raw(), &wallet, EventKind::PunkBought, ts()).unwrap();
        let mut other_asset = earlier.clone();
        other_asset.asset_id = AssetId::new(1);

        let mut trades = vec![later.clone(), earlier.clone(), other_asset.clone()];
        sort_trades_for_export(&mut trades);
        assert_eq!(trades, vec![other_asset, earlier, later]);
    }
}
