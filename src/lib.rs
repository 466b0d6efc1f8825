pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod export;
pub mod input;
pub mod ledger;
pub mod orchestration;

pub use config::Config;
pub use domain::{
    Address, AddressPolicy, AssetId, BlockRange, Decimal, EventFilter, EventKind, NormalizedTrade,
    RawTradeEvent, Role,
};
pub use engine::{FetchConfig, HoldingWindow, PnlResult, RangedFetcher};
pub use error::AppError;
pub use ledger::{JsonRpcLedger, Ledger, LedgerError, MockLedger};
pub use orchestration::{PnlReport, PnlRequest, WalletEventCollector};
