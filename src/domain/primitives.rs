//! Domain primitives: Address, AssetId, BlockRange, Role, EventKind, EventFilter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet or contract address (`0x`-prefixed hex string, casing as supplied).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string.
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare two addresses ignoring checksum casing.
    pub fn matches(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// Lower-case hex without the `0x` prefix.
    pub fn bare_lowercase(&self) -> String {
        let s = self.0.strip_prefix("0x").unwrap_or(&self.0);
        s.to_ascii_lowercase()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the traded collectible (the punk index).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn new(id: u64) -> Self {
        AssetId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive block-number interval. A range whose `from_block` exceeds
/// `to_block` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockRange {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from_block > self.to_block
    }

    /// Number of blocks covered (0 when empty).
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.to_block - self.from_block).saturating_add(1)
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        !self.is_empty() && self.from_block <= block && block <= self.to_block
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from_block, self.to_block)
    }
}

/// The wallet's part in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Buyer,
    Seller,
    Unknown,
}

impl Role {
    /// Resolve the role of `wallet` in a trade from `source` to `destination`.
    ///
    /// The destination is checked first, so a self-trade resolves to Buyer.
    pub fn resolve(wallet: &Address, source: &Address, destination: &Address) -> Self {
        if destination.matches(wallet) {
            Role::Buyer
        } else if source.matches(wallet) {
            Role::Seller
        } else {
            Role::Unknown
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Buyer => write!(f, "Buyer"),
            Role::Seller => write!(f, "Seller"),
            Role::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Contract event being indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `PunkBought(uint256 indexed punkIndex, uint256 value, address indexed fromAddress, address indexed toAddress)`
    #[serde(rename = "Bought")]
    PunkBought,
}

impl EventKind {
    /// Canonical Solidity event signature, hashed to form topic0.
    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::PunkBought => "PunkBought(uint256,uint256,address,address)",
        }
    }

    /// Short label used in exports.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::PunkBought => "Bought",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::PunkBought => write!(f, "PunkBought"),
        }
    }
}

/// Server-side address predicate on an indexed event argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// `fromAddress == wallet`
    Source(Address),
    /// `toAddress == wallet`
    Destination(Address),
}

impl EventFilter {
    pub fn address(&self) -> &Address {
        match self {
            EventFilter::Source(a) | EventFilter::Destination(a) => a,
        }
    }

    /// Both directional filters for one wallet, source first.
    pub fn both_roles(wallet: &Address) -> [EventFilter; 2] {
        [
            EventFilter::Source(wallet.clone()),
            EventFilter::Destination(wallet.clone()),
        ]
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::Source(a) => write!(f, "fromAddress={}", a),
            EventFilter::Destination(a) => write!(f, "toAddress={}", a),
        }
    }
}
