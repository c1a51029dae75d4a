// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use walletsync_schema::schema::tokens::dsl;

use super::models::Token;
use crate::error::{WalletError, WalletResult};

pub async fn store_tokens(conn: &mut AsyncPgConnection, rows: &[Token]) -> WalletResult<()> {
    for row in rows {
        diesel::insert_into(dsl::tokens)
            .values(row)
            .on_conflict((dsl::business_uid, dsl::token_address))
            .do_update()
            .set((
                dsl::decimals.eq(row.decimals),
                dsl::token_name.eq(&row.token_name),
                dsl::collect_amount.eq(&row.collect_amount),
                dsl::cold_amount.eq(&row.cold_amount),
                dsl::timestamp.eq(row.timestamp),
            ))
            .execute(conn)
            .await?;
    }
    Ok(())
}

pub async fn token_by_address(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    token_address: &str,
) -> WalletResult<Option<Token>> {
    match dsl::tokens
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::token_address.eq(token_address))
        .first::<Token>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}
