// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use diesel::upsert::DecoratableTarget;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::warn;
use uuid::Uuid;

use walletsync_schema::schema::withdraws::dsl;

use super::models::Withdraw;
use crate::error::{WalletError, WalletResult};
use crate::types::TxStatus;

pub async fn store_withdraw(conn: &mut AsyncPgConnection, row: &Withdraw) -> WalletResult<()> {
    diesel::insert_into(dsl::withdraws)
        .values(row)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn store_withdraws(conn: &mut AsyncPgConnection, rows: &[Withdraw]) -> WalletResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(dsl::withdraws)
        .values(rows)
        .on_conflict((dsl::business_uid, dsl::tx_hash))
        .filter_target(dsl::tx_hash.ne(""))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

/// Signed-but-unsent rows awaiting broadcast. Rows still in `create_unsigned`
/// qualify once a signed blob has been attached.
pub async fn unsent_list(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
) -> WalletResult<Vec<Withdraw>> {
    Ok(dsl::withdraws
        .filter(dsl::business_uid.eq(business_uid))
        .filter(
            dsl::status
                .eq(TxStatus::Signed)
                .or(dsl::status.eq(TxStatus::CreateUnsigned)),
        )
        .filter(dsl::tx_sign_hex.ne(""))
        .load(conn)
        .await?)
}

pub async fn notify_list(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
) -> WalletResult<Vec<Withdraw>> {
    Ok(dsl::withdraws
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
        dsl::withdraws
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
            "no withdraws updated by tx hash"
        );
    }
    Ok(())
}

/// Record broadcast results: the chain-assigned hash and the status advance.
pub async fn mark_broadcasted(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    results: &[(Uuid, String)],
) -> WalletResult<()> {
    for (guid, tx_hash) in results {
        diesel::update(
            dsl::withdraws
                .filter(dsl::business_uid.eq(business_uid))
                .filter(dsl::guid.eq(*guid)),
        )
        .set((
            dsl::tx_hash.eq(tx_hash),
            dsl::status.eq(TxStatus::Broadcasted),
        ))
        .execute(conn)
        .await?;
    }
    Ok(())
}

pub async fn withdraw_by_id(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    guid: Uuid,
) -> WalletResult<Option<Withdraw>> {
    match dsl::withdraws
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::guid.eq(guid))
        .first::<Withdraw>(conn)
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
        dsl::withdraws
            .filter(dsl::business_uid.eq(business_uid))
            .filter(dsl::guid.eq(guid)),
    )
    .set((dsl::tx_sign_hex.eq(signed_tx), dsl::status.eq(status)))
    .execute(conn)
    .await?;

    if updated == 0 {
        return Err(WalletError::NotFound(format!("withdraw {guid}")));
    }
    Ok(())
}
