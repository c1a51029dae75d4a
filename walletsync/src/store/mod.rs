// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persistence layer. Each submodule owns the queries for one table; the
//! [`Store`] facade hands out pooled connections and scopes multi-table
//! writes to a single database transaction.

use diesel_async::scoped_futures::ScopedBoxFuture;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use walletsync_pg_db::Db;

use crate::error::{WalletError, WalletResult};

pub mod addresses;
pub mod balances;
pub mod blocks;
pub mod business;
pub mod deposits;
pub mod internals;
pub mod models;
pub mod tokens;
pub mod transactions;
pub mod withdraws;

pub use balances::{BalanceDelta, LockEntry};
pub use models::{
    Address, Balance, BlockRow, Business, Deposit, Internal, Token, TransactionRow, Withdraw,
};

#[derive(Clone)]
pub struct Store {
    db: Db,
}

impl Store {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn conn(&self) -> WalletResult<walletsync_pg_db::Connection<'_>> {
        self.db
            .connect()
            .await
            .map_err(|e| WalletError::Database(format!("acquire connection: {e}")))
    }

    /// Run `callback` inside a single database transaction.
    pub async fn transaction<'a, T, F>(&self, callback: F) -> WalletResult<T>
    where
        F: for<'r> FnOnce(&'r mut AsyncPgConnection) -> ScopedBoxFuture<'a, 'r, WalletResult<T>>
            + Send
            + 'a,
        T: Send + 'a,
    {
        let mut conn = self.conn().await?;
        let pg: &mut AsyncPgConnection = &mut conn;
        pg.transaction(callback).await
    }

    pub async fn business_list(&self) -> WalletResult<Vec<Business>> {
        let mut conn = self.conn().await?;
        business::business_list(&mut conn).await
    }

    pub async fn latest_block(&self) -> WalletResult<Option<BlockRow>> {
        let mut conn = self.conn().await?;
        blocks::latest_block(&mut conn).await
    }

    pub async fn store_blocks(&self, rows: &[BlockRow]) -> WalletResult<()> {
        let mut conn = self.conn().await?;
        blocks::store_blocks(&mut conn, rows).await
    }

    pub async fn address_map(
        &self,
        business_uid: &str,
    ) -> WalletResult<std::collections::HashMap<String, crate::types::AddressType>> {
        let mut conn = self.conn().await?;
        addresses::address_map(&mut conn, business_uid).await
    }

    pub async fn unsent_withdraws(&self, business_uid: &str) -> WalletResult<Vec<Withdraw>> {
        let mut conn = self.conn().await?;
        withdraws::unsent_list(&mut conn, business_uid).await
    }

    pub async fn unsent_internals(&self, business_uid: &str) -> WalletResult<Vec<Internal>> {
        let mut conn = self.conn().await?;
        internals::unsent_list(&mut conn, business_uid).await
    }

    pub async fn notify_deposits(&self, business_uid: &str) -> WalletResult<Vec<Deposit>> {
        let mut conn = self.conn().await?;
        deposits::notify_list(&mut conn, business_uid).await
    }

    pub async fn notify_withdraws(&self, business_uid: &str) -> WalletResult<Vec<Withdraw>> {
        let mut conn = self.conn().await?;
        withdraws::notify_list(&mut conn, business_uid).await
    }

    pub async fn notify_internals(&self, business_uid: &str) -> WalletResult<Vec<Internal>> {
        let mut conn = self.conn().await?;
        internals::notify_list(&mut conn, business_uid).await
    }
}
