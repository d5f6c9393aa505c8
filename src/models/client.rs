// Registered push clients (device tokens)
// One row per device; a user may hold several and a token may move between
// accounts on shared devices, so registration reassigns rather than duplicates.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::clients;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = clients)]
pub struct Client {
    pub id: i32,
    pub user_id: i32,
    pub device_token: String,
    pub platform: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clients)]
pub struct NewClient<'a> {
    pub user_id: i32,
    pub device_token: &'a str,
    pub platform: &'a str,
}

impl Client {
    /// Register a device token for a user. An existing row for the same token
    /// is moved to this user instead of creating a duplicate.
    pub async fn register(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        device_token: &str,
        platform: &str,
    ) -> QueryResult<Client> {
        let existing: Option<Client> = clients::table
            .filter(clients::device_token.eq(device_token))
            .select(Client::as_select())
            .first(conn)
            .await
            .optional()?;

        match existing {
            Some(client) if client.user_id == user_id => Ok(client),
            Some(client) => {
                diesel::update(clients::table.find(client.id))
                    .set(clients::user_id.eq(user_id))
                    .returning(Client::as_returning())
                    .get_result(conn)
                    .await
            },
            None => {
                diesel::insert_into(clients::table)
                    .values(NewClient {
                        user_id,
                        device_token,
                        platform,
                    })
                    .returning(Client::as_returning())
                    .get_result(conn)
                    .await
            },
        }
    }

    /// Remove a device token on logout. Scoped to the user so one account
    /// cannot unregister another's device.
    pub async fn unregister(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        device_token: &str,
    ) -> QueryResult<usize> {
        diesel::delete(
            clients::table
                .filter(clients::user_id.eq(user_id))
                .filter(clients::device_token.eq(device_token)),
        )
        .execute(conn)
        .await
    }

    pub async fn tokens_for_user(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> QueryResult<Vec<String>> {
        clients::table
            .filter(clients::user_id.eq(user_id))
            .select(clients::device_token)
            .load(conn)
            .await
    }

    /// Distinct device tokens across a set of receivers, for fan-out
    pub async fn tokens_for_users(
        conn: &mut AsyncPgConnection,
        user_ids: &[i32],
    ) -> QueryResult<Vec<String>> {
        clients::table
            .filter(clients::user_id.eq_any(user_ids))
            .select(clients::device_token)
            .distinct()
            .load(conn)
            .await
    }
}
