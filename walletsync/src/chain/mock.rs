// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Programmable in-memory chain used to drive workers in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AccountInfo, BlockHeader, BlockTx, ChainAdapter, TxMessage, TxValue, UnsignPayload};
use crate::error::{WalletError, WalletResult};

#[derive(Default)]
struct MockState {
    headers: BTreeMap<u64, BlockHeader>,
    block_txs: HashMap<u64, Vec<BlockTx>>,
    tx_messages: HashMap<String, TxMessage>,
    send_results: HashMap<String, String>,
    sent: Vec<String>,
    fast_fee: String,
    accounts: HashMap<String, AccountInfo>,
    fail_block_info: bool,
}

#[derive(Default)]
pub struct MockChainAdapter {
    state: Mutex<MockState>,
}

impl MockChainAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the mock chain with empty blocks up to and including `head`.
    pub fn extend_chain(&self, head: u64) {
        let mut state = self.state.lock().unwrap();
        let start = state.headers.keys().next_back().map(|n| n + 1).unwrap_or(0);
        for number in start..=head {
            let parent_hash = state
                .headers
                .get(&number.wrapping_sub(1))
                .map(|h| h.hash.clone())
                .unwrap_or_else(|| "0x00".to_string());
            state.headers.insert(
                number,
                BlockHeader {
                    hash: format!("0xblock{number:04}"),
                    parent_hash,
                    number,
                    timestamp: 1_700_000_000 + number,
                },
            );
        }
    }

    /// Place a transfer into the given block and register its canonical
    /// details for `getTxByHash`.
    pub fn add_transfer(&self, number: u64, tx: BlockTx) {
        let mut state = self.state.lock().unwrap();
        state.tx_messages.insert(
            tx.hash.clone(),
            TxMessage {
                hash: tx.hash.clone(),
                from_address: tx.from.clone(),
                to_address: tx.to.clone(),
                values: vec![TxValue {
                    address: tx.to.clone(),
                    value: tx.value.clone(),
                }],
                fee: "21000".to_string(),
                status: "Success".to_string(),
                block_number: Some(number),
            },
        );
        state.block_txs.entry(number).or_default().push(tx);
    }

    pub fn set_send_result(&self, raw_tx: &str, tx_hash: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .send_results
            .insert(raw_tx.to_string(), tx_hash.to_string());
    }

    pub fn sent_transactions(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn set_fast_fee(&self, fee: &str) {
        self.state.lock().unwrap().fast_fee = fee.to_string();
    }

    pub fn set_account(&self, address: &str, info: AccountInfo) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(address.to_string(), info);
    }

    pub fn fail_block_info(&self, fail: bool) {
        self.state.lock().unwrap().fail_block_info = fail;
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn block_header(&self, number: Option<u64>) -> WalletResult<BlockHeader> {
        let state = self.state.lock().unwrap();
        let header = match number {
            Some(n) => state.headers.get(&n),
            None => state.headers.values().next_back(),
        };
        header
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("header {number:?}")))
    }

    async fn block_transactions(&self, number: u64) -> WalletResult<Vec<BlockTx>> {
        let state = self.state.lock().unwrap();
        if state.fail_block_info {
            return Err(WalletError::Transient("block info unavailable".into()));
        }
        Ok(state.block_txs.get(&number).cloned().unwrap_or_default())
    }

    async fn transaction_by_hash(&self, hash: &str) -> WalletResult<TxMessage> {
        let state = self.state.lock().unwrap();
        state
            .tx_messages
            .get(hash)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("tx {hash}")))
    }

    async fn account_info(&self, address: &str) -> WalletResult<AccountInfo> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.get(address).cloned().unwrap_or_default())
    }

    async fn send_tx(&self, raw_tx: &str) -> WalletResult<String> {
        let mut state = self.state.lock().unwrap();
        match state.send_results.get(raw_tx).cloned() {
            Some(hash) => {
                state.sent.push(raw_tx.to_string());
                Ok(hash)
            }
            None => Err(WalletError::Rpc(format!("unknown raw tx: {raw_tx}"))),
        }
    }

    async fn convert_address(
        &self,
        _type_or_version: &str,
        public_key: &str,
    ) -> WalletResult<String> {
        // Deterministic pseudo-address derived from the public key.
        let mut address = public_key.trim_start_matches("0x").to_ascii_lowercase();
        address.truncate(40);
        while address.len() < 40 {
            address.push('0');
        }
        Ok(format!("0x{address}"))
    }

    async fn create_unsign_transaction(&self, _payload: &UnsignPayload) -> WalletResult<String> {
        Ok("0xunsigned".to_string())
    }

    async fn build_signed_transaction(
        &self,
        _payload: &UnsignPayload,
        signature: &str,
    ) -> WalletResult<String> {
        Ok(format!("0xsigned{signature}"))
    }

    async fn fast_fee(&self, _address: &str) -> WalletResult<String> {
        let state = self.state.lock().unwrap();
        if state.fast_fee.is_empty() {
            Ok("1000000000|2000000000|*3".to_string())
        } else {
            Ok(state.fast_fee.clone())
        }
    }
}
