//! Parsing and validation of operator-supplied values.

use crate::domain::{
    validate_wallet_address, Address, AddressError, AddressPolicy, AssetId, Decimal,
};
use crate::engine::HoldingWindow;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

pub const MAX_WALLETS: usize = 10;

/// Reference prices above this many ETH are flagged as suspicious.
pub const HIGH_PRICE_THRESHOLD_ETH: u32 = 200;

/// Accepts `35.99`, `35.99 ETH`, `35.99 $112,683.97`, `35.99 ETH $112,683.97 USD`
/// and `35.99 ETH ($112,683.97 USD)`.
const PRICE_PATTERN: &str =
    r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:ETH)?\s*(?:\(?\s*\$\s*([\d,]+(?:\.\d+)?)\s*(?:USD)?\s*\)?)?\s*$";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("You must enter between 1 and {max} wallet addresses, got {got}")]
    WalletCount { got: usize, max: usize },
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("Invalid asset id {0:?}: must be numeric")]
    AssetId(String),
    #[error("Invalid ETH price {0:?}: use a format like '35.99 ETH ($112,683.97 USD)'")]
    Price(String),
    #[error("No valid timeframes selected")]
    NoWindows,
}

/// Current market price of the asset, entered by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencePrice {
    pub eth: Decimal,
    pub usd: Option<Decimal>,
}

impl ReferencePrice {
    pub fn is_unusually_high(&self) -> bool {
        self.eth > Decimal::from(rust_decimal::Decimal::from(HIGH_PRICE_THRESHOLD_ETH))
    }
}

impl fmt::Display for ReferencePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.usd {
            Some(usd) => write!(f, "{} ETH (${} USD)", self.eth, usd),
            None => write!(f, "{} ETH", self.eth),
        }
    }
}

/// Parse a comma-separated list of 1 to 10 wallet addresses.
///
/// Every entry must pass validation; the first bad one aborts the parse.
pub fn parse_wallet_list(input: &str, policy: AddressPolicy) -> Result<Vec<Address>, InputError> {
    let entries: Vec<&str> = input.split(',').map(str::trim).collect();
    if entries.is_empty() || entries.len() > MAX_WALLETS {
        return Err(InputError::WalletCount {
            got: entries.len(),
            max: MAX_WALLETS,
        });
    }

    entries
        .into_iter()
        .map(|entry| validate_wallet_address(entry, policy).map_err(InputError::from))
        .collect()
}

/// Parse optional linked wallets. Invalid entries are logged and skipped.
pub fn parse_linked_wallets(input: &str, policy: AddressPolicy) -> Vec<Address> {
    input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| validate_wallet_address(entry, policy).ok())
        .collect()
}

pub fn parse_asset_id(input: &str) -> Result<AssetId, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(InputError::AssetId(input.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map(AssetId::new)
        .map_err(|_| InputError::AssetId(input.to_string()))
}

/// Parse free-text price input into an ETH amount and an optional USD amount.
pub fn parse_reference_price(input: &str) -> Result<ReferencePrice, InputError> {
    let invalid = || InputError::Price(input.to_string());
    static PRICE_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let pattern = PRICE_REGEX
        .get_or_init(|| Regex::new(PRICE_PATTERN))
        .as_ref()
        .map_err(|_| invalid())?;
    let captures = pattern.captures(input).ok_or_else(invalid)?;

    let eth = captures
        .get(1)
        .and_then(|m| Decimal::from_str_canonical(m.as_str()).ok())
        .ok_or_else(invalid)?;
    let usd = match captures.get(2) {
        Some(m) => Some(
            Decimal::from_str_canonical(&m.as_str().replace(',', "")).map_err(|_| invalid())?,
        ),
        None => None,
    };

    let price = ReferencePrice { eth, usd };
    if price.is_unusually_high() {
        warn!(
            "The ETH price {} is unusually high. Please verify it was typed correctly.",
            price.eth
        );
    }
    Ok(price)
}

/// Map comma-separated menu choices onto holding windows.
///
/// Unknown choices are ignored; duplicates collapse. Fails when nothing valid remains.
pub fn parse_window_selections(input: &str) -> Result<Vec<HoldingWindow>, InputError> {
    let windows: BTreeSet<HoldingWindow> = input
        .split(',')
        .filter_map(HoldingWindow::from_menu_choice)
        .collect();
    if windows.is_empty() {
        return Err(InputError::NoWindows);
    }
    Ok(windows.into_iter().collect())
}
