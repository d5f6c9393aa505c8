// User accounts

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::middleware::auth::Role;
use crate::schema::users;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub stripe_customer_id: Option<String>,
    pub role: String,
    pub is_japanese: bool,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> QueryResult<Option<User>> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email: &str,
    ) -> QueryResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_by_stripe_customer(
        conn: &mut AsyncPgConnection,
        customer_id: &str,
    ) -> QueryResult<Option<User>> {
        users::table
            .filter(users::stripe_customer_id.eq(customer_id))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// All accounts with a given role, newest first
    pub async fn list_by_roles(
        conn: &mut AsyncPgConnection,
        roles: &[Role],
    ) -> QueryResult<Vec<User>> {
        let role_strings: Vec<&str> = roles.iter().map(Role::as_str).collect();
        users::table
            .filter(users::role.eq_any(role_strings))
            .order(users::id.desc())
            .select(User::as_select())
            .load(conn)
            .await
    }

    pub async fn set_role(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        role: Role,
    ) -> QueryResult<usize> {
        diesel::update(users::table.find(user_id))
            .set(users::role.eq(role.as_str()))
            .execute(conn)
            .await
    }

    pub async fn set_password_hash(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        hash: &str,
    ) -> QueryResult<usize> {
        diesel::update(users::table.find(user_id))
            .set(users::password_hash.eq(hash))
            .execute(conn)
            .await
    }

    pub async fn set_stripe_customer(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        customer_id: &str,
    ) -> QueryResult<usize> {
        diesel::update(users::table.find(user_id))
            .set(users::stripe_customer_id.eq(customer_id))
            .execute(conn)
            .await
    }

    pub async fn set_language(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        is_japanese: bool,
    ) -> QueryResult<usize> {
        diesel::update(users::table.find(user_id))
            .set(users::is_japanese.eq(is_japanese))
            .execute(conn)
            .await
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<&'a str>,
    pub email: &'a str,
    pub country: Option<&'a str>,
    pub state: Option<&'a str>,
    pub city: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub is_japanese: bool,
}

impl NewUser<'_> {
    pub async fn insert(&self, conn: &mut AsyncPgConnection) -> QueryResult<User> {
        diesel::insert_into(users::table)
            .values(self)
            .returning(User::as_returning())
            .get_result(conn)
            .await
    }
}

/// Partial profile update; None fields are left untouched
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl UserProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.dob.is_none()
            && self.phone.is_none()
            && self.country.is_none()
            && self.state.is_none()
            && self.city.is_none()
    }

    pub async fn apply(&self, conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<User> {
        diesel::update(users::table.find(user_id))
            .set(self)
            .returning(User::as_returning())
            .get_result(conn)
            .await
    }
}
