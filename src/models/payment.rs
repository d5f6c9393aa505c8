// Payment records keyed by Stripe invoice id
// The invoice id as primary key makes webhook replay idempotent at the
// database level.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::payments;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: String,
    pub user_id: i32,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment<'a> {
    pub id: &'a str,
    pub user_id: i32,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
}

impl NewPayment<'_> {
    /// Insert unless a payment with this invoice id already exists.
    /// Returns true when a new row was written.
    pub async fn insert_if_absent(&self, conn: &mut AsyncPgConnection) -> QueryResult<bool> {
        let inserted = diesel::insert_into(payments::table)
            .values(self)
            .on_conflict(payments::id)
            .do_nothing()
            .execute(conn)
            .await?;
        Ok(inserted > 0)
    }
}

impl Payment {
    pub async fn find(conn: &mut AsyncPgConnection, id: &str) -> QueryResult<Option<Payment>> {
        payments::table
            .find(id)
            .select(Payment::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> QueryResult<Vec<Payment>> {
        payments::table
            .filter(payments::user_id.eq(user_id))
            .order(payments::period_start.desc())
            .select(Payment::as_select())
            .load(conn)
            .await
    }
}
