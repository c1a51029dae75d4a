// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{WalletError, WalletResult};
use crate::types::TransactionType;

pub const NOTIFY_PATH: &str = "/dapplink/notify";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub txn: Vec<NotifyTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyTransaction {
    pub block_hash: String,
    pub block_number: String,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub fee: String,
    pub tx_type: TransactionType,
    pub confirms: u8,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyResponse {
    pub success: bool,
}

/// Webhook client for one tenant's callback URL.
pub struct NotifyClient {
    client: reqwest::Client,
    base_url: String,
}

impl NotifyClient {
    pub fn new(base_url: &str) -> WalletResult<Self> {
        if base_url.is_empty() {
            return Err(WalletError::Config("notify url cannot be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| WalletError::Config(format!("build notify client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Deliver one notification payload. Returns the business's acknowledged
    /// success flag; any HTTP status >= 400 counts as failure.
    pub async fn business_notify(&self, request: &NotifyRequest) -> WalletResult<bool> {
        let url = format!("{}{}", self.base_url, NOTIFY_PATH);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| WalletError::Transient(format!("notify request failed: {e}")))?;

        let status = response.status();
        if status >= StatusCode::BAD_REQUEST {
            warn!(%url, %status, "notify endpoint returned error status");
            return Ok(false);
        }

        let body: NotifyResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Transient(format!("invalid notify response: {e}")))?;
        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_rejected() {
        assert!(matches!(
            NotifyClient::new(""),
            Err(WalletError::Config(_))
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = NotifyClient::new("http://callback.example/").unwrap();
        assert_eq!(client.base_url, "http://callback.example");
    }

    #[test]
    fn test_payload_shape() {
        let request = NotifyRequest {
            txn: vec![NotifyTransaction {
                block_hash: "0xb".into(),
                block_number: "100".into(),
                hash: "0xh1".into(),
                from_address: "0xbbbb".into(),
                to_address: "0xaaaa".into(),
                value: "1000".into(),
                fee: "21000".into(),
                tx_type: TransactionType::Deposit,
                confirms: 3,
                token_address: "0x00".into(),
                token_id: String::new(),
                token_meta: String::new(),
            }],
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        let tx = &json["txn"][0];
        assert_eq!(tx["block_number"], "100");
        assert_eq!(tx["tx_type"], "deposit");
        assert_eq!(tx["confirms"], 3);
        assert_eq!(tx["value"], "1000");
    }
}
