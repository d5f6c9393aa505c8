// Support enquiries

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::enquiries;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RESOLVED: &str = "resolved";

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = enquiries)]
pub struct Enquiry {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: String,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = enquiries)]
pub struct NewEnquiry<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub email: &'a str,
    pub message: &'a str,
}

impl NewEnquiry<'_> {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<Enquiry> {
        diesel::insert_into(enquiries::table)
            .values(self)
            .returning(Enquiry::as_returning())
            .get_result(conn)
            .await
    }
}

impl Enquiry {
    pub async fn find(conn: &mut AsyncPgConnection, id: i32) -> QueryResult<Option<Enquiry>> {
        enquiries::table
            .find(id)
            .select(Enquiry::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_all(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Enquiry>> {
        enquiries::table
            .order(enquiries::created_at.desc())
            .select(Enquiry::as_select())
            .load(conn)
            .await
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> QueryResult<Vec<Enquiry>> {
        enquiries::table
            .filter(enquiries::user_id.eq(user_id))
            .order(enquiries::created_at.desc())
            .select(Enquiry::as_select())
            .load(conn)
            .await
    }

    pub async fn mark_resolved(
        conn: &mut AsyncPgConnection,
        id: i32,
        resolved_at: i64,
    ) -> QueryResult<Enquiry> {
        diesel::update(enquiries::table.find(id))
            .set((
                enquiries::status.eq(STATUS_RESOLVED),
                enquiries::resolved_at.eq(resolved_at),
            ))
            .returning(Enquiry::as_returning())
            .get_result(conn)
            .await
    }
}
