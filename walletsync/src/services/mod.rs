// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Business-facing operations. The external RPC surface (gRPC) forwards to
//! these handlers; the JSON server in [`server`] exposes the same operations
//! for direct integration and tests.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use diesel_async::scoped_futures::ScopedFutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::chain::{ChainAdapter, FeeInfo, UnsignPayload};
use crate::error::{WalletError, WalletResult};
use crate::store::{
    addresses, balances, business, deposits, internals, tokens, withdraws, Address, Balance,
    Business, Deposit, Internal, Store, Token, Withdraw,
};
use crate::types::{normalize_hex, now_ts, AddressType, TokenType, TransactionType, TxStatus};

pub mod server;

pub const NATIVE_CONTRACT: &str = "0x00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCode {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessRegisterRequest {
    pub request_id: String,
    pub notify_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BusinessRegisterResponse {
    pub code: ReturnCode,
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicKeyItem {
    #[serde(rename = "type")]
    pub address_type: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportAddressesRequest {
    pub request_id: String,
    pub public_keys: Vec<PublicKeyItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportAddressesResponse {
    pub code: ReturnCode,
    pub msg: String,
    pub addresses: Vec<ExportedAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnsignTransactionRequest {
    pub request_id: String,
    pub chain_id: String,
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub token_meta: String,
    pub tx_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsignTransactionResponse {
    pub code: ReturnCode,
    pub msg: String,
    pub transaction_id: String,
    pub un_sign_tx: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignTransactionRequest {
    pub request_id: String,
    pub transaction_id: String,
    pub signature: String,
    pub tx_type: String,
    #[serde(default)]
    pub chain_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignTransactionResponse {
    pub code: ReturnCode,
    pub msg: String,
    pub signed_tx: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenItem {
    pub address: String,
    pub decimals: i16,
    pub token_name: String,
    pub collect_amount: String,
    pub cold_amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetTokenAddressRequest {
    pub request_id: String,
    pub token_list: Vec<TokenItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetTokenAddressResponse {
    pub code: ReturnCode,
    pub msg: String,
}

pub struct BusinessService {
    store: Store,
    chain: Arc<dyn ChainAdapter>,
}

impl BusinessService {
    pub fn new(store: Store, chain: Arc<dyn ChainAdapter>) -> Self {
        Self { store, chain }
    }

    pub async fn business_register(
        &self,
        request: BusinessRegisterRequest,
    ) -> WalletResult<BusinessRegisterResponse> {
        if request.request_id.is_empty() || request.notify_url.is_empty() {
            return Ok(BusinessRegisterResponse {
                code: ReturnCode::Error,
                msg: "invalid params".into(),
            });
        }

        let row = Business {
            guid: Uuid::new_v4(),
            business_uid: request.request_id.clone(),
            notify_url: request.notify_url.clone(),
            timestamp: now_ts(),
        };

        let mut conn = self.store.conn().await?;
        if let Err(err) = business::store_business(&mut conn, &row).await {
            error!(error = %err, "store business failed");
            return Ok(BusinessRegisterResponse {
                code: ReturnCode::Error,
                msg: "store db fail".into(),
            });
        }

        info!(business = %request.request_id, "registered business");
        Ok(BusinessRegisterResponse {
            code: ReturnCode::Success,
            msg: "config business success".into(),
        })
    }

    pub async fn export_addresses_by_public_keys(
        &self,
        request: ExportAddressesRequest,
    ) -> WalletResult<ExportAddressesResponse> {
        let error = |msg: &str| ExportAddressesResponse {
            code: ReturnCode::Error,
            msg: msg.into(),
            addresses: Vec::new(),
        };

        if request.request_id.is_empty() || request.public_keys.is_empty() {
            return Ok(error("invalid params"));
        }

        let mut conn = self.store.conn().await?;

        // At most one hot and one cold wallet per tenant.
        let mut has_hot =
            addresses::wallet_of_type(&mut conn, &request.request_id, AddressType::Hot)
                .await?
                .is_some();
        let mut has_cold =
            addresses::wallet_of_type(&mut conn, &request.request_id, AddressType::Cold)
                .await?
                .is_some();

        let mut exported = Vec::new();
        let mut address_rows = Vec::new();
        let mut balance_rows = Vec::new();

        for item in &request.public_keys {
            let address_type = match AddressType::parse(&item.address_type) {
                Ok(t) => t,
                Err(err) => return Ok(error(&err.to_string())),
            };
            match address_type {
                AddressType::Hot if has_hot => {
                    return Ok(error("tenant already has a hot wallet"))
                }
                AddressType::Hot => has_hot = true,
                AddressType::Cold if has_cold => {
                    return Ok(error("tenant already has a cold wallet"))
                }
                AddressType::Cold => has_cold = true,
                AddressType::Eoa => {}
            }

            let address = self
                .chain
                .convert_address(&item.address_type, &item.public_key)
                .await?;
            let address = normalize_hex(&address);

            let account = self.chain.account_info(&address).await?;
            let seeded_balance = account
                .balance
                .parse::<BigDecimal>()
                .unwrap_or_else(|_| BigDecimal::from(0));

            address_rows.push(Address {
                guid: Uuid::new_v4(),
                business_uid: request.request_id.clone(),
                address: address.clone(),
                address_type,
                public_key: item.public_key.clone(),
                timestamp: now_ts(),
            });
            balance_rows.push(Balance {
                guid: Uuid::new_v4(),
                business_uid: request.request_id.clone(),
                address: address.clone(),
                token_address: NATIVE_CONTRACT.to_string(),
                address_type,
                balance: seeded_balance,
                lock_balance: BigDecimal::from(0),
                timestamp: now_ts(),
            });
            exported.push(ExportedAddress {
                address_type: item.address_type.clone(),
                address,
            });
        }

        drop(conn);
        self.store
            .transaction(move |conn| {
                async move {
                    addresses::store_addresses(conn, &address_rows).await?;
                    balances::store_balances(conn, &balance_rows).await
                }
                .scope_boxed()
            })
            .await?;

        Ok(ExportAddressesResponse {
            code: ReturnCode::Success,
            msg: "generate address success".into(),
            addresses: exported,
        })
    }

    pub async fn create_unsign_transaction(
        &self,
        request: UnsignTransactionRequest,
    ) -> WalletResult<UnsignTransactionResponse> {
        let error = |msg: &str| UnsignTransactionResponse {
            code: ReturnCode::Error,
            msg: msg.into(),
            transaction_id: String::new(),
            un_sign_tx: "0x00".into(),
        };

        if request.request_id.is_empty()
            || request.from.is_empty()
            || request.to.is_empty()
            || request.value.is_empty()
        {
            return Ok(error("invalid params"));
        }

        let tx_type = match TransactionType::parse(&request.tx_type) {
            Ok(t) => t,
            Err(_) => return Ok(error("unsupported transaction type")),
        };

        let amount = match request.value.parse::<BigDecimal>() {
            Ok(v) => v,
            Err(_) => return Ok(error("invalid amount value")),
        };

        let account = self.chain.account_info(&request.from).await?;
        let fast_fee = self.chain.fast_fee(&request.from).await?;
        let fee = FeeInfo::parse_fast_fee(&fast_fee)?;

        let contract_address = if request.contract_address.is_empty() {
            NATIVE_CONTRACT.to_string()
        } else {
            request.contract_address.clone()
        };
        let gas_limit = FeeInfo::gas_limit_for(&contract_address);
        let token_type = if contract_address == NATIVE_CONTRACT {
            TokenType::Eth
        } else {
            TokenType::Erc20
        };

        let guid = Uuid::new_v4();
        self.store_unsigned_flow(
            &request,
            guid,
            tx_type,
            amount,
            gas_limit,
            &fee,
            token_type,
            &contract_address,
        )
        .await?;

        let payload = UnsignPayload {
            chain_id: request.chain_id.clone(),
            nonce: account.sequence,
            from_address: request.from.clone(),
            to_address: request.to.clone(),
            gas_limit,
            max_fee_per_gas: fee.max_priority_fee.to_string(),
            max_priority_fee_per_gas: fee.multiplied_tip.to_string(),
            amount: request.value.clone(),
            contract_address: contract_address.clone(),
        };

        let un_sign_tx = self.chain.create_unsign_transaction(&payload).await?;

        Ok(UnsignTransactionResponse {
            code: ReturnCode::Success,
            msg: "build un sign transaction success".into(),
            transaction_id: guid.to_string(),
            un_sign_tx,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn store_unsigned_flow(
        &self,
        request: &UnsignTransactionRequest,
        guid: Uuid,
        tx_type: TransactionType,
        amount: BigDecimal,
        gas_limit: u64,
        fee: &FeeInfo,
        token_type: TokenType,
        contract_address: &str,
    ) -> WalletResult<()> {
        let mut conn = self.store.conn().await?;
        let business_uid = request.request_id.clone();
        let from_address = normalize_hex(&request.from);
        let to_address = normalize_hex(&request.to);
        let token_address = normalize_hex(contract_address);

        match tx_type {
            TransactionType::Deposit => {
                let row = Deposit {
                    guid,
                    business_uid,
                    timestamp: now_ts(),
                    status: TxStatus::CreateUnsigned,
                    confirms: 0,
                    block_hash: String::new(),
                    block_number: 0,
                    tx_hash: String::new(),
                    tx_type,
                    from_address,
                    to_address,
                    amount,
                    gas_limit: gas_limit as i64,
                    max_fee_per_gas: fee.max_priority_fee.to_string(),
                    max_priority_fee_per_gas: fee.multiplied_tip.to_string(),
                    token_type,
                    token_address,
                    token_id: request.token_id.clone(),
                    token_meta: request.token_meta.clone(),
                    tx_sign_hex: String::new(),
                };
                deposits::store_deposits(&mut conn, std::slice::from_ref(&row)).await
            }
            TransactionType::Withdraw => {
                let row = Withdraw {
                    guid,
                    business_uid,
                    timestamp: now_ts(),
                    status: TxStatus::CreateUnsigned,
                    confirms: 0,
                    block_hash: String::new(),
                    block_number: 0,
                    tx_hash: String::new(),
                    tx_type,
                    from_address,
                    to_address,
                    amount,
                    gas_limit: gas_limit as i64,
                    max_fee_per_gas: fee.max_priority_fee.to_string(),
                    max_priority_fee_per_gas: fee.multiplied_tip.to_string(),
                    token_type,
                    token_address,
                    token_id: request.token_id.clone(),
                    token_meta: request.token_meta.clone(),
                    tx_sign_hex: String::new(),
                };
                withdraws::store_withdraw(&mut conn, &row).await
            }
            TransactionType::Collection | TransactionType::Hot2Cold | TransactionType::Cold2Hot => {
                let row = Internal {
                    guid,
                    business_uid,
                    timestamp: now_ts(),
                    status: TxStatus::CreateUnsigned,
                    confirms: 0,
                    block_hash: String::new(),
                    block_number: 0,
                    tx_hash: String::new(),
                    tx_type,
                    from_address,
                    to_address,
                    amount,
                    gas_limit: gas_limit as i64,
                    max_fee_per_gas: fee.max_priority_fee.to_string(),
                    max_priority_fee_per_gas: fee.multiplied_tip.to_string(),
                    token_type,
                    token_address,
                    token_id: request.token_id.clone(),
                    token_meta: request.token_meta.clone(),
                    tx_sign_hex: String::new(),
                };
                internals::store_internal(&mut conn, &row).await
            }
            TransactionType::Unknown => {
                Err(WalletError::Validation("unsupported transaction type".into()))
            }
        }
    }

    pub async fn build_signed_transaction(
        &self,
        request: SignTransactionRequest,
    ) -> WalletResult<SignTransactionResponse> {
        let error = |msg: &str| SignTransactionResponse {
            code: ReturnCode::Error,
            msg: msg.into(),
            signed_tx: String::new(),
        };

        let tx_type = match TransactionType::parse(&request.tx_type) {
            Ok(t) => t,
            Err(_) => return Ok(error("unsupported transaction type")),
        };
        let guid = match Uuid::parse_str(&request.transaction_id) {
            Ok(id) => id,
            Err(_) => return Ok(error("invalid transaction id")),
        };
        if request.signature.is_empty() {
            return Ok(error("signature cannot be empty"));
        }

        let mut conn = self.store.conn().await?;
        let stored = match tx_type {
            TransactionType::Deposit => {
                deposits::deposit_by_id(&mut conn, &request.request_id, guid)
                    .await?
                    .map(|row| FlowFields::from_deposit(&row))
            }
            TransactionType::Withdraw => {
                withdraws::withdraw_by_id(&mut conn, &request.request_id, guid)
                    .await?
                    .map(|row| FlowFields::from_withdraw(&row))
            }
            _ => internals::internal_by_id(&mut conn, &request.request_id, guid)
                .await?
                .map(|row| FlowFields::from_internal(&row)),
        };

        let Some(flow) = stored else {
            return Ok(error("transaction not found"));
        };

        let account = self.chain.account_info(&flow.from_address).await?;
        let payload = UnsignPayload {
            chain_id: request.chain_id.clone(),
            nonce: account.sequence,
            from_address: flow.from_address.clone(),
            to_address: flow.to_address.clone(),
            gas_limit: flow.gas_limit as u64,
            max_fee_per_gas: flow.max_fee_per_gas.clone(),
            max_priority_fee_per_gas: flow.max_priority_fee_per_gas.clone(),
            amount: flow.amount.to_string(),
            contract_address: flow.token_address.clone(),
        };

        let signed_tx = self
            .chain
            .build_signed_transaction(&payload, &request.signature)
            .await?;

        match tx_type {
            TransactionType::Deposit => {
                deposits::update_by_id(
                    &mut conn,
                    &request.request_id,
                    guid,
                    &signed_tx,
                    TxStatus::Signed,
                )
                .await?
            }
            TransactionType::Withdraw => {
                withdraws::update_by_id(
                    &mut conn,
                    &request.request_id,
                    guid,
                    &signed_tx,
                    TxStatus::Signed,
                )
                .await?
            }
            _ => {
                internals::update_by_id(
                    &mut conn,
                    &request.request_id,
                    guid,
                    &signed_tx,
                    TxStatus::Signed,
                )
                .await?
            }
        }

        Ok(SignTransactionResponse {
            code: ReturnCode::Success,
            msg: "build signed transaction success".into(),
            signed_tx,
        })
    }

    pub async fn set_token_address(
        &self,
        request: SetTokenAddressRequest,
    ) -> WalletResult<SetTokenAddressResponse> {
        if request.request_id.is_empty() {
            return Ok(SetTokenAddressResponse {
                code: ReturnCode::Error,
                msg: "invalid params".into(),
            });
        }

        let mut rows = Vec::with_capacity(request.token_list.len());
        for item in &request.token_list {
            let collect_amount = item
                .collect_amount
                .parse::<BigDecimal>()
                .unwrap_or_else(|_| BigDecimal::from(0));
            let cold_amount = item
                .cold_amount
                .parse::<BigDecimal>()
                .unwrap_or_else(|_| BigDecimal::from(0));
            rows.push(Token {
                guid: Uuid::new_v4(),
                business_uid: request.request_id.clone(),
                token_address: normalize_hex(&item.address),
                decimals: item.decimals,
                token_name: item.token_name.clone(),
                collect_amount,
                cold_amount,
                timestamp: now_ts(),
            });
        }

        let mut conn = self.store.conn().await?;
        tokens::store_tokens(&mut conn, &rows).await?;

        Ok(SetTokenAddressResponse {
            code: ReturnCode::Success,
            msg: "set token address success".into(),
        })
    }
}

/// The subset of flow columns needed to rebuild a signing payload, shared by
/// the three flow tables.
struct FlowFields {
    from_address: String,
    to_address: String,
    amount: BigDecimal,
    gas_limit: i64,
    max_fee_per_gas: String,
    max_priority_fee_per_gas: String,
    token_address: String,
}

impl FlowFields {
    fn from_deposit(row: &Deposit) -> Self {
        Self {
            from_address: row.from_address.clone(),
            to_address: row.to_address.clone(),
            amount: row.amount.clone(),
            gas_limit: row.gas_limit,
            max_fee_per_gas: row.max_fee_per_gas.clone(),
            max_priority_fee_per_gas: row.max_priority_fee_per_gas.clone(),
            token_address: row.token_address.clone(),
        }
    }

    fn from_withdraw(row: &Withdraw) -> Self {
        Self {
            from_address: row.from_address.clone(),
            to_address: row.to_address.clone(),
            amount: row.amount.clone(),
            gas_limit: row.gas_limit,
            max_fee_per_gas: row.max_fee_per_gas.clone(),
            max_priority_fee_per_gas: row.max_priority_fee_per_gas.clone(),
            token_address: row.token_address.clone(),
        }
    }

    fn from_internal(row: &Internal) -> Self {
        Self {
            from_address: row.from_address.clone(),
            to_address: row.to_address.clone(),
            amount: row.amount.clone(),
            gas_limit: row.gas_limit,
            max_fee_per_gas: row.max_fee_per_gas.clone(),
            max_priority_fee_per_gas: row.max_priority_fee_per_gas.clone(),
            token_address: row.token_address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ReturnCode::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&ReturnCode::Error).unwrap(),
            "\"ERROR\""
        );
    }

    #[test]
    fn test_unsign_request_deserialization() {
        let json = r#"{
            "request_id": "b1",
            "chain_id": "1",
            "from": "0xHot",
            "to": "0xDest",
            "value": "500",
            "tx_type": "withdraw"
        }"#;
        let request: UnsignTransactionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.request_id, "b1");
        assert_eq!(request.contract_address, "");
        assert_eq!(request.tx_type, "withdraw");
    }
}
