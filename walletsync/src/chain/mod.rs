// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed adapter over the chain-account RPC.
//!
//! The wallet scanner never talks to a chain node directly; the chain-account
//! service owns address derivation, fee estimation, signing payload assembly
//! and transaction submission. This module exposes the subset of its surface
//! the scanner consumes, behind the [`ChainAdapter`] seam so workers can be
//! driven by a mock in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WalletResult;

pub mod client;
pub mod fee;

#[cfg(test)]
pub mod mock;

pub use client::ChainAccountClient;
pub use fee::{FeeInfo, ETH_GAS_LIMIT, TOKEN_GAS_LIMIT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub parent_hash: String,
    pub number: u64,
    pub timestamp: u64,
}

/// A transfer as reported inside a block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockTx {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub contract_wallet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxValue {
    pub address: String,
    pub value: String,
}

/// Canonical transaction details fetched by hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxMessage {
    pub hash: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
    pub values: Vec<TxValue>,
    pub fee: String,
    pub status: String,
    #[serde(default)]
    pub block_number: Option<u64>,
}

impl TxMessage {
    /// First transfer value carried by the transaction, as a decimal string.
    pub fn primary_value(&self) -> &str {
        self.values.first().map(|v| v.value.as_str()).unwrap_or("0")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
    pub balance: String,
}

/// EIP-1559 dynamic-fee payload forwarded to the chain-account service when
/// creating or finalizing an outgoing transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnsignPayload {
    pub chain_id: String,
    pub nonce: u64,
    pub from_address: String,
    pub to_address: String,
    pub gas_limit: u64,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub amount: String,
    pub contract_address: String,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Header at `number`, or the chain head when `None`.
    async fn block_header(&self, number: Option<u64>) -> WalletResult<BlockHeader>;

    async fn block_transactions(&self, number: u64) -> WalletResult<Vec<BlockTx>>;

    async fn transaction_by_hash(&self, hash: &str) -> WalletResult<TxMessage>;

    async fn account_info(&self, address: &str) -> WalletResult<AccountInfo>;

    /// Submit a pre-signed raw transaction, returning the tx hash.
    async fn send_tx(&self, raw_tx: &str) -> WalletResult<String>;

    async fn convert_address(&self, type_or_version: &str, public_key: &str)
        -> WalletResult<String>;

    async fn create_unsign_transaction(&self, payload: &UnsignPayload) -> WalletResult<String>;

    async fn build_signed_transaction(
        &self,
        payload: &UnsignPayload,
        signature: &str,
    ) -> WalletResult<String>;

    /// Fast-fee suggestion in the `base|tip|*multiplier` wire format.
    async fn fast_fee(&self, address: &str) -> WalletResult<String>;
}
