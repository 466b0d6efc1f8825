//! Flat CSV export of normalized trades.

use crate::domain::{
    sort_trades_for_export, Address, AssetId, Decimal, EventKind, NormalizedTrade, Role,
};
use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Column order of the export file.
pub const EXPORT_COLUMNS: [&str; 9] = [
    "asset_id",
    "wallet_address",
    "role",
    "event_kind",
    "transaction_id",
    "source_address",
    "destination_address",
    "price",
    "timestamp",
];

/// UTC, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export file not found: {0}")]
    NotFound(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid {field} in row {row}: {reason}")]
    Parse {
        row: usize,
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportRow {
    asset_id: AssetId,
    wallet_address: Address,
    role: Role,
    event_kind: EventKind,
    transaction_id: String,
    source_address: Address,
    destination_address: Address,
    price: String,
    timestamp: String,
}

impl From<&NormalizedTrade> for ExportRow {
    fn from(trade: &NormalizedTrade) -> Self {
        ExportRow {
            asset_id: trade.asset_id,
            wallet_address: trade.wallet_address.clone(),
            role: trade.role,
            event_kind: trade.event_kind,
            transaction_id: trade.transaction_id.clone(),
            source_address: trade.source_address.clone(),
            destination_address: trade.destination_address.clone(),
            price: trade.price.to_canonical_string(),
            timestamp: trade.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl ExportRow {
    fn into_trade(self, row: usize) -> Result<NormalizedTrade, ExportError> {
        let price = Decimal::from_str_canonical(&self.price).map_err(|e| ExportError::Parse {
            row,
            field: "price",
            reason: e.to_string(),
        })?;
        let naive = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).map_err(
            |e| ExportError::Parse {
                row,
                field: "timestamp",
                reason: e.to_string(),
            },
        )?;

        Ok(NormalizedTrade {
            asset_id: self.asset_id,
            wallet_address: self.wallet_address,
            role: self.role,
            event_kind: self.event_kind,
            transaction_id: self.transaction_id,
            source_address: self.source_address,
            destination_address: self.destination_address,
            price,
            timestamp: Utc.from_utc_datetime(&naive),
        })
    }
}

/// Write `trades` to `path` in export order, replacing any existing file.
///
/// Rows go to a sibling `.tmp` file that is renamed over `path` once
/// complete, so a failed write leaves the previous export untouched.
/// Returns the number of rows written. The header is written even when
/// there are no trades.
pub fn write_trades(path: &Path, trades: &[NormalizedTrade]) -> Result<usize, ExportError> {
    let mut sorted = trades.to_vec();
    sort_trades_for_export(&mut sorted);

    let temp_path = temp_path_for(path);
    let written = write_rows(&temp_path, &sorted).and_then(|()| {
        std::fs::rename(&temp_path, path)?;
        Ok(sorted.len())
    });
    if written.is_err() {
        if let Err(e) = std::fs::remove_file(&temp_path) {
            debug!("Could not remove {}: {}", temp_path.display(), e);
        }
    }
    let written = written?;

    info!("Data exported to {}", path.display());
    Ok(written)
}

fn write_rows(path: &Path, trades: &[NormalizedTrade]) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(EXPORT_COLUMNS)?;
    for trade in trades {
        writer.serialize(ExportRow::from(trade))?;
    }
    writer.flush()?;
    Ok(())
}

/// `out.csv` -> `out.csv.tmp`, in the same directory.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Read every row of an export file.
pub fn read_trades(path: &Path) -> Result<Vec<NormalizedTrade>, ExportError> {
    if !path.exists() {
        return Err(ExportError::NotFound(path.display().to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let mut trades = Vec::new();
    for (i, record) in reader.deserialize::<ExportRow>().enumerate() {
        // Row 1 is the header.
        trades.push(record?.into_trade(i + 2)?);
    }
    Ok(trades)
}
