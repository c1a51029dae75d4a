// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use diesel::upsert::DecoratableTarget;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::warn;
use uuid::Uuid;

use walletsync_schema::schema::deposits::dsl;

use super::models::Deposit;
use crate::error::{WalletError, WalletResult};
use crate::types::TxStatus;

/// Insert discovered deposits. Re-ingesting the same block is a no-op thanks
/// to the `(business_uid, tx_hash)` uniqueness.
pub async fn store_deposits(conn: &mut AsyncPgConnection, rows: &[Deposit]) -> WalletResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(dsl::deposits)
        .values(rows)
        .on_conflict((dsl::business_uid, dsl::tx_hash))
        .filter_target(dsl::tx_hash.ne(""))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

/// Advance `confirms` for every broadcasted deposit buried below `head`, and
/// flip rows to `wallet_done` once the confirmation threshold is met.
pub async fn update_confirms(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    head: u64,
    confirmations: u64,
) -> WalletResult<()> {
    let unconfirmed: Vec<Deposit> = dsl::deposits
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::block_number.le(head as i64))
        .filter(dsl::status.eq(TxStatus::Broadcasted))
        .for_update()
        .load(conn)
        .await?;

    for deposit in unconfirmed {
        let chain_confirms = head.saturating_sub(deposit.block_number as u64);
        let (confirms, status) = if chain_confirms >= confirmations {
            (confirmations, TxStatus::WalletDone)
        } else {
            (chain_confirms, TxStatus::Broadcasted)
        };

        diesel::update(dsl::deposits.filter(dsl::guid.eq(deposit.guid)))
            .set((dsl::confirms.eq(confirms as i16), dsl::status.eq(status)))
            .execute(conn)
            .await?;
    }
    Ok(())
}

/// Rows the notifier should deliver: confirmed, plus any left in `notified`
/// by a crash between the two phases.
pub async fn notify_list(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
) -> WalletResult<Vec<Deposit>> {
    Ok(dsl::deposits
        .filter(dsl::business_uid.eq(business_uid))
        .filter(
            dsl::status
                .eq(TxStatus::WalletDone)
                .or(dsl::status.eq(TxStatus::Notified)),
        )
        .load(conn)
        .await?)
}

/// Rows whose current status cannot legally move to `status` are left
/// untouched, so re-ingestion never drags a row backwards.
pub async fn update_status_by_tx_hash(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    status: TxStatus,
    tx_hashes: &[String],
) -> WalletResult<()> {
    if tx_hashes.is_empty() {
        return Ok(());
    }
    let updated = diesel::update(
        dsl::deposits
            .filter(dsl::business_uid.eq(business_uid))
            .filter(dsl::tx_hash.eq_any(tx_hashes))
            .filter(dsl::status.eq_any(status.prior_statuses())),
    )
    .set(dsl::status.eq(status))
    .execute(conn)
    .await?;

    if updated == 0 {
        warn!(
            business_uid,
            expected = tx_hashes.len(),
            "no deposits updated by tx hash"
        );
    }
    Ok(())
}

pub async fn deposit_by_id(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    guid: Uuid,
) -> WalletResult<Option<Deposit>> {
    match dsl::deposits
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::guid.eq(guid))
        .first::<Deposit>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}

pub async fn update_by_id(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    guid: Uuid,
    signed_tx: &str,
    status: TxStatus,
) -> WalletResult<()> {
    let updated = diesel::update(
        dsl::deposits
            .filter(dsl::business_uid.eq(business_uid))
            .filter(dsl::guid.eq(guid)),
    )
    .set((dsl::tx_sign_hex.eq(signed_tx), dsl::status.eq(status)))
    .execute(conn)
    .await?;

    if updated == 0 {
        return Err(WalletError::NotFound(format!("deposit {guid}")));
    }
    Ok(())
}
