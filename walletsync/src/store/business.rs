// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use walletsync_schema::schema::business::dsl;

use super::models::Business;
use crate::error::{WalletError, WalletResult};

pub async fn store_business(conn: &mut AsyncPgConnection, row: &Business) -> WalletResult<()> {
    diesel::insert_into(dsl::business)
        .values(row)
        .on_conflict(dsl::business_uid)
        .do_update()
        .set((
            dsl::notify_url.eq(&row.notify_url),
            dsl::timestamp.eq(row.timestamp),
        ))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn business_list(conn: &mut AsyncPgConnection) -> WalletResult<Vec<Business>> {
    Ok(dsl::business
        .order(dsl::timestamp.asc())
        .load::<Business>(conn)
        .await?)
}

pub async fn business_by_uid(
    conn: &mut AsyncPgConnection,
    uid: &str,
) -> WalletResult<Option<Business>> {
    match dsl::business
        .filter(dsl::business_uid.eq(uid))
        .first::<Business>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}
