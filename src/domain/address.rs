//! Wallet address validation and EIP-55 checksum encoding.

use super::Address;
use thiserror::Error;
use tracing::warn;

/// Expected length of a `0x`-prefixed 20-byte address.
pub const ADDRESS_LEN: usize = 42;
/// Address prefix on Ethereum mainnet.
pub const ADDRESS_PREFIX: &str = "0x";

/// How strictly a wallet address is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Length and prefix only.
    Prefix,
    /// Length, prefix, hex digits and EIP-55 checksum casing.
    Checksum,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid wallet address {0}: must be 42 characters long, got {1}")]
    Length(String, usize),
    #[error("Invalid wallet address {0}: must start with '0x'")]
    Prefix(String),
    #[error("Invalid wallet address {0}: contains non-hex characters")]
    NotHex(String),
    #[error("Invalid wallet address {0}: checksum casing mismatch, expected {1}")]
    Checksum(String, String),
}

/// Compute keccak256 of a byte slice.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// EIP-55 mixed-case encoding of a 40-hex-digit address (with or without `0x`).
pub fn to_checksum(address: &str) -> String {
    let bare = address
        .strip_prefix(ADDRESS_PREFIX)
        .unwrap_or(address)
        .to_ascii_lowercase();
    let hash = keccak256(bare.as_bytes());

    let mut out = String::with_capacity(ADDRESS_LEN);
    out.push_str(ADDRESS_PREFIX);
    for (i, c) in bare.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Validate a wallet address under `policy`.
///
/// Logs the diagnostic at warn level before returning it.
pub fn validate_wallet_address(
    input: &str,
    policy: AddressPolicy,
) -> Result<Address, AddressError> {
    let result = check(input, policy);
    if let Err(e) = &result {
        warn!("{}", e);
    }
    result
}

fn check(input: &str, policy: AddressPolicy) -> Result<Address, AddressError> {
    if input.len() != ADDRESS_LEN {
        return Err(AddressError::Length(input.to_string(), input.len()));
    }
    if !input.starts_with(ADDRESS_PREFIX) {
        return Err(AddressError::Prefix(input.to_string()));
    }

    if policy == AddressPolicy::Checksum {
        if !input[ADDRESS_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit())
        {
            return Err(AddressError::NotHex(input.to_string()));
        }
        let expected = to_checksum(input);
        if expected != input {
            return Err(AddressError::Checksum(input.to_string(), expected));
        }
    }

    Ok(Address::new(input.to_string()))
}
