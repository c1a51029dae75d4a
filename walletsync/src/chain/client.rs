// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP JSON-RPC client for the chain-account service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::{AccountInfo, BlockHeader, BlockTx, ChainAdapter, TxMessage, UnsignPayload};
use crate::error::{WalletError, WalletResult};

const RETURN_CODE_SUCCESS: &str = "SUCCESS";

#[derive(Clone)]
pub struct ChainAccountClient {
    http_client: reqwest::Client,
    rpc_url: String,
    chain_name: String,
    network: String,
    request_id: Arc<AtomicU64>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Every chain-account response carries a return code and message alongside
/// its payload.
#[derive(Debug, Deserialize)]
struct Coded<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(flatten)]
    inner: T,
}

impl ChainAccountClient {
    pub fn new(rpc_url: impl Into<String>, chain_name: impl Into<String>, network: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build chain-account http client");

        Self {
            http_client,
            rpc_url: rpc_url.into(),
            chain_name: chain_name.into(),
            network: network.into(),
            request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> WalletResult<T> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: vec![params],
            id,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    WalletError::Transient(format!("{method}: {e}"))
                } else {
                    WalletError::Rpc(format!("{method}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::Rpc(format!("{method}: http status {status}")));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Rpc(format!("{method}: invalid response body: {e}")))?;

        if let Some(err) = body.error {
            return Err(WalletError::Rpc(format!(
                "{method}: rpc error {}: {}",
                err.code, err.message
            )));
        }

        let result = body
            .result
            .ok_or_else(|| WalletError::Rpc(format!("{method}: empty result")))?;

        let coded: Coded<T> = serde_json::from_value(result)
            .map_err(|e| WalletError::Rpc(format!("{method}: malformed result: {e}")))?;

        if coded.code != RETURN_CODE_SUCCESS {
            warn!(method, code = %coded.code, msg = %coded.msg, "chain-account call failed");
            return Err(WalletError::Rpc(format!("{method}: {}", coded.msg)));
        }

        Ok(coded.inner)
    }

    fn encode_payload(payload: &UnsignPayload) -> WalletResult<String> {
        let data = serde_json::to_vec(payload)
            .map_err(|e| WalletError::Validation(format!("encode unsign payload: {e}")))?;
        Ok(BASE64.encode(data))
    }
}

#[derive(Debug, Deserialize)]
struct BlockHeaderResult {
    block_header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockTxsResult {
    #[serde(default)]
    transactions: Vec<BlockTx>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    tx: TxMessage,
}

#[derive(Debug, Deserialize)]
struct AccountResult {
    account_number: String,
    sequence: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct SendTxResult {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct ConvertAddressResult {
    address: String,
}

#[derive(Debug, Deserialize)]
struct UnsignTxResult {
    un_sign_tx: String,
}

#[derive(Debug, Deserialize)]
struct SignedTxResult {
    signed_tx: String,
}

#[derive(Debug, Deserialize)]
struct FeeResult {
    fast_fee: String,
}

#[async_trait]
impl ChainAdapter for ChainAccountClient {
    async fn block_header(&self, number: Option<u64>) -> WalletResult<BlockHeader> {
        let result: BlockHeaderResult = self
            .call(
                "getBlockHeaderByNumber",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "height": number.unwrap_or(0),
                }),
            )
            .await?;
        Ok(result.block_header)
    }

    async fn block_transactions(&self, number: u64) -> WalletResult<Vec<BlockTx>> {
        let result: BlockTxsResult = self
            .call(
                "getBlockByNumber",
                json!({
                    "chain": self.chain_name,
                    "height": number,
                    "view_tx": true,
                }),
            )
            .await?;
        Ok(result.transactions)
    }

    async fn transaction_by_hash(&self, hash: &str) -> WalletResult<TxMessage> {
        let result: TxResult = self
            .call(
                "getTxByHash",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "hash": hash,
                }),
            )
            .await?;
        Ok(result.tx)
    }

    async fn account_info(&self, address: &str) -> WalletResult<AccountInfo> {
        let result: AccountResult = self
            .call(
                "getAccount",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "address": address,
                    "contract_address": "0x00",
                }),
            )
            .await?;

        let account_number = result
            .account_number
            .parse()
            .map_err(|_| WalletError::Rpc(format!("invalid account number: {}", result.account_number)))?;
        let sequence = result
            .sequence
            .parse()
            .map_err(|_| WalletError::Rpc(format!("invalid sequence: {}", result.sequence)))?;

        Ok(AccountInfo {
            account_number,
            sequence,
            balance: result.balance,
        })
    }

    async fn send_tx(&self, raw_tx: &str) -> WalletResult<String> {
        let result: SendTxResult = self
            .call(
                "sendTx",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "raw_tx": raw_tx,
                }),
            )
            .await?;
        Ok(result.tx_hash)
    }

    async fn convert_address(
        &self,
        type_or_version: &str,
        public_key: &str,
    ) -> WalletResult<String> {
        let result: ConvertAddressResult = self
            .call(
                "convertAddress",
                json!({
                    "chain": self.chain_name,
                    "type": type_or_version,
                    "public_key": public_key,
                }),
            )
            .await?;
        Ok(result.address)
    }

    async fn create_unsign_transaction(&self, payload: &UnsignPayload) -> WalletResult<String> {
        let base64_tx = Self::encode_payload(payload)?;
        let result: UnsignTxResult = self
            .call(
                "createUnSignTransaction",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "base64_tx": base64_tx,
                }),
            )
            .await?;
        Ok(result.un_sign_tx)
    }

    async fn build_signed_transaction(
        &self,
        payload: &UnsignPayload,
        signature: &str,
    ) -> WalletResult<String> {
        let base64_tx = Self::encode_payload(payload)?;
        let result: SignedTxResult = self
            .call(
                "buildSignedTransaction",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "base64_tx": base64_tx,
                    "signature": signature,
                }),
            )
            .await?;
        Ok(result.signed_tx)
    }

    async fn fast_fee(&self, address: &str) -> WalletResult<String> {
        let result: FeeResult = self
            .call(
                "getFee",
                json!({
                    "chain": self.chain_name,
                    "network": self.network,
                    "address": address,
                    "raw_tx": "",
                }),
            )
            .await?;
        Ok(result.fast_fee)
    }
}
