// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{WalletError, WalletResult};

/// Gas limit for native transfers.
pub const ETH_GAS_LIMIT: u64 = 60_000;
/// Gas limit for token contract transfers.
pub const TOKEN_GAS_LIMIT: u64 = 120_000;

/// Parsed fast-fee suggestion.
///
/// The chain-account service reports fees as `base|tip|*multiplier`;
/// `multiplied_tip = tip * multiplier` and
/// `max_priority_fee = base + multiplied_tip * 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeInfo {
    pub gas_price: u128,
    pub gas_tip_cap: u128,
    pub multiplier: u128,
    pub multiplied_tip: u128,
    pub max_priority_fee: u128,
}

impl FeeInfo {
    pub fn parse_fast_fee(fee: &str) -> WalletResult<Self> {
        let parts: Vec<&str> = fee.split('|').collect();
        if parts.len() != 3 {
            return Err(WalletError::Validation(format!("invalid fee format: {fee}")));
        }

        let gas_price: u128 = parts[0]
            .parse()
            .map_err(|_| WalletError::Validation(format!("invalid gas price: {}", parts[0])))?;

        let gas_tip_cap: u128 = parts[1]
            .parse()
            .map_err(|_| WalletError::Validation(format!("invalid gas tip cap: {}", parts[1])))?;

        let multiplier_str = parts[2].strip_prefix('*').unwrap_or(parts[2]);
        let multiplier: u128 = multiplier_str
            .parse()
            .map_err(|_| WalletError::Validation(format!("invalid multiplier: {}", parts[2])))?;

        let multiplied_tip = gas_tip_cap
            .checked_mul(multiplier)
            .ok_or_else(|| WalletError::Validation(format!("fee overflow: {fee}")))?;

        let max_priority_fee = multiplied_tip
            .checked_mul(2)
            .and_then(|doubled| doubled.checked_add(gas_price))
            .ok_or_else(|| WalletError::Validation(format!("fee overflow: {fee}")))?;

        Ok(Self {
            gas_price,
            gas_tip_cap,
            multiplier,
            multiplied_tip,
            max_priority_fee,
        })
    }

    /// Gas limit for a transfer against `contract_address`, where `"0x00"`
    /// marks a native transfer.
    pub fn gas_limit_for(contract_address: &str) -> u64 {
        if contract_address.is_empty() || contract_address == "0x00" {
            ETH_GAS_LIMIT
        } else {
            TOKEN_GAS_LIMIT
        }
    }
}
