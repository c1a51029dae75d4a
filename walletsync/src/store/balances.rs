// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{debug, warn};
use uuid::Uuid;

use walletsync_schema::schema::balances::dsl;

use super::models::Balance;
use crate::error::{WalletError, WalletResult};
use crate::types::{now_ts, AddressType, TransactionType};

/// Per-flow balance change computed by the flow processor.
#[derive(Debug, Clone)]
pub struct BalanceDelta {
    pub from_address: String,
    pub to_address: String,
    pub token_address: String,
    pub amount: BigDecimal,
    pub tx_type: TransactionType,
}

/// Reservation made by a broadcaster when it submits a signed transaction.
/// `address_type` tags the debit-side wallet so a lock against a not yet
/// tracked `(address, token)` pair creates a correctly typed row.
#[derive(Debug, Clone)]
pub struct LockEntry {
    pub address: String,
    pub address_type: AddressType,
    pub token_address: String,
    pub amount: BigDecimal,
}

/// Wallet type of the debit side of an outbound flow. Withdraws and
/// hot-to-cold moves spend from the hot wallet, collections from the user
/// EOA, cold-to-hot moves from the cold wallet.
pub fn debit_address_type(tx_type: TransactionType) -> WalletResult<AddressType> {
    match tx_type {
        TransactionType::Withdraw | TransactionType::Hot2Cold => Ok(AddressType::Hot),
        TransactionType::Collection => Ok(AddressType::Eoa),
        TransactionType::Cold2Hot => Ok(AddressType::Cold),
        TransactionType::Deposit | TransactionType::Unknown => Err(WalletError::Validation(
            format!("transaction type {tx_type} has no debit side"),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustKind {
    /// `balance += amount`.
    Credit,
    /// `balance -= amount` and the matching broadcast lock is released.
    DebitSettle,
}

#[derive(Debug, Clone)]
pub struct BalanceAdjustment {
    pub address: String,
    pub address_type: AddressType,
    pub kind: AdjustKind,
    pub amount: BigDecimal,
}

/// Expand a classified flow into the per-address adjustments it implies.
pub fn plan_delta(delta: &BalanceDelta) -> WalletResult<Vec<BalanceAdjustment>> {
    let credit = |address: &str, address_type| BalanceAdjustment {
        address: address.to_string(),
        address_type,
        kind: AdjustKind::Credit,
        amount: delta.amount.clone(),
    };
    let debit = |address: &str, address_type| BalanceAdjustment {
        address: address.to_string(),
        address_type,
        kind: AdjustKind::DebitSettle,
        amount: delta.amount.clone(),
    };

    match delta.tx_type {
        TransactionType::Deposit => Ok(vec![credit(&delta.to_address, AddressType::Eoa)]),
        TransactionType::Withdraw => Ok(vec![debit(
            &delta.from_address,
            debit_address_type(delta.tx_type)?,
        )]),
        TransactionType::Collection => Ok(vec![
            debit(&delta.from_address, debit_address_type(delta.tx_type)?),
            credit(&delta.to_address, AddressType::Hot),
        ]),
        TransactionType::Hot2Cold => Ok(vec![
            debit(&delta.from_address, debit_address_type(delta.tx_type)?),
            credit(&delta.to_address, AddressType::Cold),
        ]),
        TransactionType::Cold2Hot => Ok(vec![
            debit(&delta.from_address, debit_address_type(delta.tx_type)?),
            credit(&delta.to_address, AddressType::Hot),
        ]),
        TransactionType::Unknown => Err(WalletError::Validation(
            "unsupported transaction type for balance update".into(),
        )),
    }
}

/// Look up the balance row for `(address, token)` with a row lock, creating a
/// zero row when none exists yet.
pub async fn query_or_create(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    address_type: AddressType,
    address: &str,
    token_address: &str,
) -> WalletResult<Balance> {
    let found = dsl::balances
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::address.eq(address))
        .filter(dsl::token_address.eq(token_address))
        .for_update()
        .first::<Balance>(conn)
        .await;

    match found {
        Ok(row) => Ok(row),
        Err(diesel::result::Error::NotFound) => {
            let row = Balance {
                guid: Uuid::new_v4(),
                business_uid: business_uid.to_string(),
                address: address.to_string(),
                token_address: token_address.to_string(),
                address_type,
                balance: BigDecimal::from(0),
                lock_balance: BigDecimal::from(0),
                timestamp: now_ts(),
            };
            diesel::insert_into(dsl::balances)
                .values(&row)
                .execute(conn)
                .await?;
            debug!(business_uid, address, token_address, "created initial balance row");
            Ok(row)
        }
        Err(err) => Err(WalletError::from(err)),
    }
}

async fn save(conn: &mut AsyncPgConnection, row: &Balance) -> WalletResult<()> {
    diesel::update(dsl::balances.filter(dsl::guid.eq(row.guid)))
        .set((
            dsl::balance.eq(&row.balance),
            dsl::lock_balance.eq(&row.lock_balance),
            dsl::timestamp.eq(now_ts()),
        ))
        .execute(conn)
        .await?;
    Ok(())
}

/// Apply the flow deltas of one tenant batch. Must run inside the batch's
/// database transaction so balance updates never cross transactions.
pub async fn apply_deltas(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    deltas: &[BalanceDelta],
) -> WalletResult<()> {
    for delta in deltas {
        for adjustment in plan_delta(delta)? {
            let mut row = query_or_create(
                conn,
                business_uid,
                adjustment.address_type,
                &adjustment.address,
                &delta.token_address,
            )
            .await?;

            match adjustment.kind {
                AdjustKind::Credit => {
                    row.balance += &adjustment.amount;
                }
                AdjustKind::DebitSettle => {
                    if row.balance < adjustment.amount {
                        warn!(
                            business_uid,
                            address = %adjustment.address,
                            balance = %row.balance,
                            amount = %adjustment.amount,
                            "debit exceeds tracked balance, clamping to zero"
                        );
                        row.balance = BigDecimal::from(0);
                    } else {
                        row.balance -= &adjustment.amount;
                    }
                    // Release the reservation taken at broadcast time.
                    if row.lock_balance < adjustment.amount {
                        row.lock_balance = BigDecimal::from(0);
                    } else {
                        row.lock_balance -= &adjustment.amount;
                    }
                }
            }
            save(conn, &row).await?;
        }
    }
    Ok(())
}

/// Reserve `amount` against the debit side of a just-broadcast transaction.
pub async fn add_locks(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    locks: &[LockEntry],
) -> WalletResult<()> {
    for lock in locks {
        let mut row = query_or_create(
            conn,
            business_uid,
            lock.address_type,
            &lock.address,
            &lock.token_address,
        )
        .await?;
        row.lock_balance += &lock.amount;
        save(conn, &row).await?;
    }
    Ok(())
}

pub async fn balance_of(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    address: &str,
    token_address: &str,
) -> WalletResult<Option<Balance>> {
    match dsl::balances
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::address.eq(address))
        .filter(dsl::token_address.eq(token_address))
        .first::<Balance>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}

pub async fn store_balances(conn: &mut AsyncPgConnection, rows: &[Balance]) -> WalletResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(dsl::balances)
        .values(rows)
        .on_conflict((dsl::business_uid, dsl::address, dsl::token_address))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}
