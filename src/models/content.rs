// In-app content: news posts, ads and the ad display frequency

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::{ads, ads_frequency, news};

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = news)]
pub struct News {
    pub id: i32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = news)]
pub struct NewNews {
    pub title: String,
    pub description: String,
}

impl News {
    pub async fn list_all(conn: &mut AsyncPgConnection) -> QueryResult<Vec<News>> {
        news::table
            .order(news::id.desc())
            .select(News::as_select())
            .load(conn)
            .await
    }

    /// Most recent posts, newest first
    pub async fn list_latest(conn: &mut AsyncPgConnection, limit: i64) -> QueryResult<Vec<News>> {
        news::table
            .order(news::id.desc())
            .limit(limit)
            .select(News::as_select())
            .load(conn)
            .await
    }

    pub async fn create(conn: &mut AsyncPgConnection, item: &NewNews) -> QueryResult<News> {
        diesel::insert_into(news::table)
            .values(item)
            .returning(News::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn delete(conn: &mut AsyncPgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(news::table.find(id)).execute(conn).await
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = ads)]
pub struct Ad {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub redirect_url: String,
    pub bg_color: String,
    pub title_color: String,
    pub description_color: String,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = ads)]
pub struct NewAd {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub redirect_url: String,
    pub bg_color: String,
    pub title_color: String,
    pub description_color: String,
}

impl Ad {
    pub async fn list_all(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Ad>> {
        ads::table
            .order(ads::id.desc())
            .select(Ad::as_select())
            .load(conn)
            .await
    }

    pub async fn create(conn: &mut AsyncPgConnection, item: &NewAd) -> QueryResult<Ad> {
        diesel::insert_into(ads::table)
            .values(item)
            .returning(Ad::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn delete(conn: &mut AsyncPgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(ads::table.find(id)).execute(conn).await
    }
}

/// Global ad display frequency, a single seeded row
pub async fn get_ad_frequency(conn: &mut AsyncPgConnection) -> QueryResult<i32> {
    ads_frequency::table
        .order(ads_frequency::id.asc())
        .select(ads_frequency::frequency)
        .first(conn)
        .await
}

pub async fn set_ad_frequency(conn: &mut AsyncPgConnection, frequency: i32) -> QueryResult<usize> {
    diesel::update(ads_frequency::table)
        .set(ads_frequency::frequency.eq(frequency))
        .execute(conn)
        .await
}
