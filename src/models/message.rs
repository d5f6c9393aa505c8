// Broadcast messages and their receiver rows
// A message row is written once per broadcast; receiver rows record which
// users it was addressed to and back the per-user history queries.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::{message_receivers, messages};

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: i32,
    pub sender_id: i32,
    pub kind: Option<String>,
    pub code: Option<String>,
    pub body: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub sender_id: i32,
    pub kind: Option<&'a str>,
    pub code: Option<&'a str>,
    pub body: Option<&'a str>,
    pub created_at: i64,
}

impl NewMessage<'_> {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<Message> {
        diesel::insert_into(messages::table)
            .values(self)
            .returning(Message::as_returning())
            .get_result(conn)
            .await
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = message_receivers)]
pub struct NewMessageReceiver {
    pub message_id: i32,
    pub receiver_id: i32,
}

impl NewMessageReceiver {
    /// Batch-insert receiver rows for one message. The composite primary key
    /// makes accidental duplicates a no-op.
    pub async fn insert_batch(
        conn: &mut AsyncPgConnection,
        message_id: i32,
        receiver_ids: &[i32],
    ) -> QueryResult<usize> {
        if receiver_ids.is_empty() {
            return Ok(0);
        }
        let rows: Vec<NewMessageReceiver> = receiver_ids
            .iter()
            .map(|&receiver_id| NewMessageReceiver {
                message_id,
                receiver_id,
            })
            .collect();
        diesel::insert_into(message_receivers::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(conn)
            .await
    }
}

impl Message {
    /// Full message history addressed to a user, newest first
    pub async fn list_for_receiver(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> QueryResult<Vec<Message>> {
        messages::table
            .inner_join(message_receivers::table)
            .filter(message_receivers::receiver_id.eq(user_id))
            .order(messages::created_at.desc())
            .select(Message::as_select())
            .load(conn)
            .await
    }

    /// Messages addressed to a user in the last 24 hours, newest first
    pub async fn list_recent_for_receiver(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        now_ms: i64,
    ) -> QueryResult<Vec<Message>> {
        let cutoff = now_ms - 24 * 3600 * 1000;
        messages::table
            .inner_join(message_receivers::table)
            .filter(message_receivers::receiver_id.eq(user_id))
            .filter(messages::created_at.ge(cutoff))
            .order(messages::created_at.desc())
            .select(Message::as_select())
            .load(conn)
            .await
    }
}
