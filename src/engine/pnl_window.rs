//! Holding-period PnL windows.

use crate::domain::Decimal;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// One side of a position: when it happened and at what price (ETH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub date: DateTime<Utc>,
    pub price: Decimal,
}

impl Leg {
    pub fn new(date: DateTime<Utc>, price: Decimal) -> Self {
        Self { date, price }
    }
}

/// Holding-period lengths offered to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HoldingWindow {
    ThreeDays,
    Weekly,
    Monthly,
    Yearly,
}

impl HoldingWindow {
    pub const ALL: [HoldingWindow; 4] = [
        HoldingWindow::ThreeDays,
        HoldingWindow::Weekly,
        HoldingWindow::Monthly,
        HoldingWindow::Yearly,
    ];

    pub fn days(&self) -> u32 {
        match self {
            HoldingWindow::ThreeDays => 3,
            HoldingWindow::Weekly => 7,
            HoldingWindow::Monthly => 30,
            HoldingWindow::Yearly => 365,
        }
    }

    /// Menu numbering: 1 → 3 days, 2 → 7 days, 3 → 30 days, 4 → 365 days.
    pub fn from_menu_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(HoldingWindow::ThreeDays),
            "2" => Some(HoldingWindow::Weekly),
            "3" => Some(HoldingWindow::Monthly),
            "4" => Some(HoldingWindow::Yearly),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        format!("{}-day PnL", self.days())
    }
}

impl fmt::Display for HoldingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// PnL for one holding window. The two markers are never numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlResult {
    /// Gain (or loss, when negative) in ETH.
    Gain(Decimal),
    /// The sale happened after the window closed.
    OutsideWindow { window_days: u32 },
    /// No purchase to measure from, or the sale precedes the purchase.
    NoValidTransaction,
}

impl PnlResult {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            PnlResult::Gain(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PnlResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PnlResult::Gain(v) => write!(f, "{} ETH", v),
            PnlResult::OutsideWindow { window_days } => write!(
                f,
                "The transaction is more than {} days, so we can't calculate the PnL",
                window_days
            ),
            PnlResult::NoValidTransaction => write!(f, "No valid transaction within the timeframe"),
        }
    }
}

/// PnL of a position over a holding window of `window_days`.
///
/// With both legs, the sale counts only if
/// `purchase.date < sale.date <= purchase.date + window_days`.
/// With a purchase and no sale, the reference price stands in for the sale
/// and the window length is not consulted.
pub fn window_pnl(
    purchase: Option<&Leg>,
    sale: Option<&Leg>,
    window_days: u32,
    reference_price: Option<Decimal>,
) -> PnlResult {
    match (purchase, sale, reference_price) {
        (Some(purchase), Some(sale), _) => {
            let deadline = purchase.date + Duration::days(i64::from(window_days));
            if purchase.date < sale.date && sale.date <= deadline {
                PnlResult::Gain(sale.price - purchase.price)
            } else if sale.date > deadline {
                PnlResult::OutsideWindow { window_days }
            } else {
                PnlResult::NoValidTransaction
            }
        }
        (Some(purchase), None, Some(reference)) => PnlResult::Gain(reference - purchase.price),
        _ => PnlResult::NoValidTransaction,
    }
}

/// Evaluate every requested window, keyed and ordered by window length.
pub fn pnl_by_window(
    purchase: Option<&Leg>,
    sale: Option<&Leg>,
    windows: &[HoldingWindow],
    reference_price: Option<Decimal>,
) -> BTreeMap<HoldingWindow, PnlResult> {
    windows
        .iter()
        .map(|w| (*w, window_pnl(purchase, sale, w.days(), reference_price)))
        .collect()
}
