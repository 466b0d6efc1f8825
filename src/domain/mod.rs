//! Domain types for the punk trade ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: Address, AssetId, BlockRange, Role, EventKind, EventFilter
//! - Wallet address validation (length, prefix, EIP-55 checksum)
//! - Raw ledger events and their normalized, exportable form

pub mod address;
pub mod decimal;
pub mod primitives;
pub mod trade;

pub use address::{validate_wallet_address, AddressError, AddressPolicy};
pub use decimal::Decimal;
pub use primitives::{Address, AssetId, BlockRange, EventFilter, EventKind, Role};
pub use trade::{sort_trades_for_export, NormalizeError, NormalizedTrade, RawTradeEvent};
