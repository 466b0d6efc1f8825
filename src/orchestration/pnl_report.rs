//! PnL report for one (wallet, asset) pair, built from the export file.

use crate::domain::{validate_wallet_address, Address, AddressPolicy, AssetId, NormalizedTrade};
use crate::engine::{HoldingWindow, PnlResult, Position, PositionSummary};
use crate::export::{self, ExportError, TIMESTAMP_FORMAT};
use crate::input::{
    parse_asset_id, parse_linked_wallets, parse_reference_price, parse_window_selections,
    InputError, ReferencePrice,
};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone)]
pub struct PnlRequest {
    pub main_wallet: Address,
    /// Listed in the report only; the position comes from the main wallet.
    pub linked_wallets: Vec<Address>,
    pub asset_id: AssetId,
    pub reference: ReferencePrice,
    pub windows: Vec<HoldingWindow>,
}

impl PnlRequest {
    /// Parse operator input for the PnL stage.
    ///
    /// Wallets only need the `0x` prefix and length here. Export rows are
    /// matched case-insensitively, so a lowercase wallet still finds its
    /// checksummed rows.
    pub fn parse(
        wallet: &str,
        linked: Option<&str>,
        asset_id: &str,
        price: &str,
        windows: &str,
    ) -> Result<Self, InputError> {
        let main_wallet = validate_wallet_address(wallet.trim(), AddressPolicy::Prefix)?;
        let linked_wallets = linked
            .map(|s| parse_linked_wallets(s, AddressPolicy::Prefix))
            .unwrap_or_default();
        Ok(PnlRequest {
            main_wallet,
            linked_wallets,
            asset_id: parse_asset_id(asset_id)?,
            reference: parse_reference_price(price)?,
            windows: parse_window_selections(windows)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PnlReport {
    pub request: PnlRequest,
    /// Trades of the main wallet in the asset, oldest first.
    pub trades: Vec<NormalizedTrade>,
    pub position: Position,
    pub summary: PositionSummary,
    pub windows: BTreeMap<HoldingWindow, PnlResult>,
}

impl PnlReport {
    /// Build a report from already-loaded trades.
    pub fn build(request: PnlRequest, all_trades: &[NormalizedTrade]) -> Self {
        let mut trades: Vec<NormalizedTrade> = all_trades
            .iter()
            .filter(|t| {
                t.asset_id == request.asset_id && t.wallet_address.matches(&request.main_wallet)
            })
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.timestamp);

        let position = Position::from_trades(&trades, &request.main_wallet, request.asset_id);
        let summary = position.summary(request.reference.eth);
        let windows = position.pnl_by_window(&request.windows, Some(request.reference.eth));

        PnlReport {
            request,
            trades,
            position,
            summary,
            windows,
        }
    }

    /// Load the export at `path` and build the report.
    pub fn load(request: PnlRequest, path: &Path) -> Result<Self, ReportError> {
        let all_trades = export::read_trades(path)?;
        info!(
            "Loaded {} trade(s) from {}",
            all_trades.len(),
            path.display()
        );
        Ok(Self::build(request, &all_trades))
    }
}

impl fmt::Display for PnlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let req = &self.request;
        writeln!(f, "Main wallet: {}", req.main_wallet)?;
        for linked in &req.linked_wallets {
            writeln!(f, "Linked wallet: {}", linked)?;
        }
        writeln!(f, "Reference price: {}", req.reference)?;

        if self.trades.is_empty() {
            writeln!(
                f,
                "\nNo transactions found for Wallet Address: {} and Asset ID: {}",
                req.main_wallet, req.asset_id
            )?;
            writeln!(
                f,
                "Using the reference price of {} ETH for PnL calculation.",
                req.reference.eth
            )?;
        } else {
            writeln!(f, "\nTransactions for the selected wallet and asset:")?;
            for trade in &self.trades {
                writeln!(
                    f,
                    "  {}  {:<7} {:<6} {} ETH",
                    trade.timestamp.format(TIMESTAMP_FORMAT),
                    trade.role.to_string(),
                    trade.event_kind.label(),
                    trade.price
                )?;
            }
        }

        match self.summary {
            PositionSummary::Realized {
                purchase,
                sale,
                pnl,
            } => writeln!(
                f,
                "\nCalculated PnL: Sale Price ({}) - Purchase Price ({}) = {} ETH",
                sale, purchase, pnl
            )?,
            PositionSummary::Unrealized { pnl } => writeln!(
                f,
                "\nAsset {} not sold yet. Using the reference price for PnL: {} ETH",
                req.asset_id, pnl
            )?,
            PositionSummary::NoTransactions { pnl } => {
                writeln!(f, "\nNo valid transactions found. Final PnL: {} ETH", pnl)?
            }
        }

        writeln!(f, "\nPnL by timeframe:")?;
        for (window, result) in &self.windows {
            writeln!(f, "  - {}: {}", window, result)?;
        }
        Ok(())
    }
}
