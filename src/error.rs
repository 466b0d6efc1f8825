use crate::config::ConfigError;
use crate::domain::AddressError;
use crate::export::ExportError;
use crate::input::InputError;
use crate::orchestration::{CollectError, ReportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to connect to the ledger at {0}")]
    NotConnected(String),
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("Event collection failed: {0}")]
    Collect(#[from] CollectError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}
