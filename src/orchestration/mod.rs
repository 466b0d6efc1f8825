//! Jobs that tie the ledger, engine and export together.

pub mod collector;
pub mod pnl_report;

pub use collector::{CollectError, CollectionResult, WalletEventCollector};
pub use pnl_report::{PnlReport, PnlRequest, ReportError};
