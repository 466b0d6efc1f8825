use crate::domain::{Address, AssetId, Decimal, NormalizedTrade, Role};

use super::pnl_window::{pnl_by_window, HoldingWindow, Leg, PnlResult};
use std::collections::BTreeMap;

/// A wallet's holding of one asset: its first purchase and first sale.
///
/// Later purchases and sales are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub wallet: Address,
    pub asset_id: AssetId,
    pub purchase: Option<Leg>,
    pub sale: Option<Leg>,
}

/// Overall result reported before the per-window breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSummary {
    /// Bought and sold: sale − purchase.
    Realized {
        purchase: Decimal,
        sale: Decimal,
        pnl: Decimal,
    },
    /// Bought, not sold yet: reference − purchase.
    Unrealized { pnl: Decimal },
    /// No purchase on record: −reference.
    NoTransactions { pnl: Decimal },
}

impl PositionSummary {
    pub fn pnl(&self) -> Decimal {
        match self {
            PositionSummary::Realized { pnl, .. }
            | PositionSummary::Unrealized { pnl }
            | PositionSummary::NoTransactions { pnl } => *pnl,
        }
    }
}

impl Position {
    /// Derive the position of `wallet` in `asset_id` from exported trades.
    ///
    /// Trades need not be pre-filtered or sorted.
    pub fn from_trades(trades: &[NormalizedTrade], wallet: &Address, asset_id: AssetId) -> Self {
        let mut relevant: Vec<&NormalizedTrade> = trades
            .iter()
            .filter(|t| t.asset_id == asset_id && t.wallet_address.matches(wallet))
            .collect();
        relevant.sort_by_key(|t| t.timestamp);

        let first_leg = |role: Role| {
            relevant
                .iter()
                .find(|t| t.role == role)
                .map(|t| Leg::new(t.timestamp, t.price))
        };

        Position {
            wallet: wallet.clone(),
            asset_id,
            purchase: first_leg(Role::Buyer),
            sale: first_leg(Role::Seller),
        }
    }

    pub fn pnl_by_window(
        &self,
        windows: &[HoldingWindow],
        reference_price: Option<Decimal>,
    ) -> BTreeMap<HoldingWindow, PnlResult> {
        pnl_by_window(
            self.purchase.as_ref(),
            self.sale.as_ref(),
            windows,
            reference_price,
        )
    }

    pub fn summary(&self, reference_price: Decimal) -> PositionSummary {
        match (&self.purchase, &self.sale) {
            (Some(purchase), Some(sale)) => PositionSummary::Realized {
                purchase: purchase.price,
                sale: sale.price,
                pnl: sale.price - purchase.price,
            },
            (Some(purchase), None) => PositionSummary::Unrealized {
                pnl: reference_price - purchase.price,
            },
            _ => PositionSummary::NoTransactions {
                pnl: -reference_price,
            },
        }
    }
}
