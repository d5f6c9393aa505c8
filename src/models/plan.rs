// Local mirror of the Stripe plan catalog
// Refreshed transactionally by the explicit catalog sync; readers only ever
// see a complete catalog.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::schema::plans;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = plans)]
pub struct Plan {
    pub id: i32,
    pub name: String,
    pub stripe_product_id: String,
    pub description_en: String,
    pub description_ja: String,
    /// Session category: "0" day, "1" night, "2" all-day
    pub session: String,
    pub monthly_price: Option<String>,
    pub yearly_price: Option<String>,
    pub monthly_price_id: Option<String>,
    pub yearly_price_id: Option<String>,
}

impl Plan {
    pub async fn list_all(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Plan>> {
        plans::table
            .order(plans::id.asc())
            .select(Plan::as_select())
            .load(conn)
            .await
    }

    /// Plan owning the given Stripe price id, monthly or yearly
    pub async fn find_by_price_id(
        conn: &mut AsyncPgConnection,
        price_id: &str,
    ) -> QueryResult<Option<Plan>> {
        plans::table
            .filter(
                plans::monthly_price_id
                    .eq(price_id)
                    .or(plans::yearly_price_id.eq(price_id)),
            )
            .select(Plan::as_select())
            .first(conn)
            .await
            .optional()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = plans)]
pub struct NewPlan {
    pub name: String,
    pub stripe_product_id: String,
    pub description_en: String,
    pub description_ja: String,
    pub session: String,
    pub monthly_price: Option<String>,
    pub yearly_price: Option<String>,
    pub monthly_price_id: Option<String>,
    pub yearly_price_id: Option<String>,
}

/// Replace the whole catalog in one transaction
pub async fn replace_catalog(
    conn: &mut AsyncPgConnection,
    new_plans: &[NewPlan],
) -> QueryResult<usize> {
    diesel::delete(plans::table).execute(conn).await?;
    diesel::insert_into(plans::table)
        .values(new_plans)
        .execute(conn)
        .await
}
