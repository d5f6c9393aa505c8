// Per-user subscription state, one row per user
// start_date and end_date are epoch milliseconds bracketing the paid coverage
// interval, normalized to Tokyo day boundaries when written by the webhook.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::user_logs;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = user_logs)]
pub struct UserLog {
    pub user_id: i32,
    pub payment_id: Option<String>,
    pub subscription_id: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub plan: Option<String>,
}

impl UserLog {
    /// Whether the coverage interval contains the given instant.
    /// A missing boundary never covers anything.
    pub fn covers(&self, epoch_ms: i64) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= epoch_ms && epoch_ms <= end,
            _ => false,
        }
    }

    pub async fn find_by_user(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> QueryResult<Option<UserLog>> {
        user_logs::table
            .find(user_id)
            .select(UserLog::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Create the subscription-state row for a new user, empty until the first
    /// payment lands
    pub async fn create_empty(conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<usize> {
        diesel::insert_into(user_logs::table)
            .values(user_logs::user_id.eq(user_id))
            .on_conflict_do_nothing()
            .execute(conn)
            .await
    }
}

/// Full replacement of the subscription state, written on payment success
#[derive(Debug, AsChangeset)]
#[diesel(table_name = user_logs)]
pub struct UserLogUpdate<'a> {
    pub payment_id: Option<&'a str>,
    pub subscription_id: Option<&'a str>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub plan: Option<&'a str>,
}

impl UserLogUpdate<'_> {
    pub async fn apply(&self, conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<usize> {
        diesel::update(user_logs::table.find(user_id))
            .set(self)
            .execute(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(start: Option<i64>, end: Option<i64>) -> UserLog {
        UserLog {
            user_id: 1,
            payment_id: None,
            subscription_id: None,
            start_date: start,
            end_date: end,
            plan: None,
        }
    }

    #[test]
    fn test_coverage_is_inclusive_on_both_ends() {
        let l = log(Some(100), Some(200));
        assert!(l.covers(100));
        assert!(l.covers(150));
        assert!(l.covers(200));
        assert!(!l.covers(99));
        assert!(!l.covers(201));
    }

    #[test]
    fn test_missing_boundaries_never_cover() {
        assert!(!log(None, None).covers(150));
        assert!(!log(Some(100), None).covers(150));
        assert!(!log(None, Some(200)).covers(150));
    }
}
