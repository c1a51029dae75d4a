// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use uuid::Uuid;

use walletsync_schema::schema::{
    addresses, balances, blocks, business, deposits, internals, tokens, transactions, withdraws,
};

use crate::types::{AddressType, TokenType, TransactionType, TxStatus};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = business)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Business {
    pub guid: Uuid,
    pub business_uid: String,
    pub notify_url: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = addresses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Address {
    pub guid: Uuid,
    pub business_uid: String,
    pub address: String,
    pub address_type: AddressType,
    pub public_key: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Token {
    pub guid: Uuid,
    pub business_uid: String,
    pub token_address: String,
    pub decimals: i16,
    pub token_name: String,
    pub collect_amount: BigDecimal,
    pub cold_amount: BigDecimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = balances)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Balance {
    pub guid: Uuid,
    pub business_uid: String,
    pub address: String,
    pub token_address: String,
    pub address_type: AddressType,
    pub balance: BigDecimal,
    pub lock_balance: BigDecimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = blocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockRow {
    pub hash: String,
    pub parent_hash: String,
    pub number: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = deposits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Deposit {
    pub guid: Uuid,
    pub business_uid: String,
    pub timestamp: i64,
    pub status: TxStatus,
    pub confirms: i16,
    pub block_hash: String,
    pub block_number: i64,
    pub tx_hash: String,
    pub tx_type: TransactionType,
    pub from_address: String,
    pub to_address: String,
    pub amount: BigDecimal,
    pub gas_limit: i64,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub token_type: TokenType,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
    pub tx_sign_hex: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = withdraws)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Withdraw {
    pub guid: Uuid,
    pub business_uid: String,
    pub timestamp: i64,
    pub status: TxStatus,
    pub confirms: i16,
    pub block_hash: String,
    pub block_number: i64,
    pub tx_hash: String,
    pub tx_type: TransactionType,
    pub from_address: String,
    pub to_address: String,
    pub amount: BigDecimal,
    pub gas_limit: i64,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub token_type: TokenType,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
    pub tx_sign_hex: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = internals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Internal {
    pub guid: Uuid,
    pub business_uid: String,
    pub timestamp: i64,
    pub status: TxStatus,
    pub confirms: i16,
    pub block_hash: String,
    pub block_number: i64,
    pub tx_hash: String,
    pub tx_type: TransactionType,
    pub from_address: String,
    pub to_address: String,
    pub amount: BigDecimal,
    pub gas_limit: i64,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub token_type: TokenType,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
    pub tx_sign_hex: String,
}

/// Flat audit log row written for every accepted flow.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransactionRow {
    pub guid: Uuid,
    pub business_uid: String,
    pub block_hash: String,
    pub block_number: i64,
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub token_address: String,
    pub token_id: String,
    pub token_meta: String,
    pub fee: BigDecimal,
    pub amount: BigDecimal,
    pub status: String,
    pub tx_type: TransactionType,
    pub timestamp: i64,
}
