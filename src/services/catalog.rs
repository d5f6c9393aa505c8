// Plan catalog sync
// Mirrors active Stripe products and prices into the local plans table.
// Runs only when explicitly requested by an operator; the replacement is
// transactional so readers never observe a half-synced catalog.

use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;

use crate::db::DieselPool;
use crate::models::plan::{replace_catalog, NewPlan};
use crate::services::stripe::{Price, StripeClient};
use crate::utils::api_error::ApiError;

fn format_amount(price: &Price) -> Option<String> {
    let amount = price.unit_amount?;
    let currency = price.currency.as_deref().unwrap_or("");
    // Zero-decimal currency amounts (JPY) are already whole units
    if currency.eq_ignore_ascii_case("jpy") {
        Some(format!("{}", amount))
    } else {
        Some(format!("{}.{:02}", amount / 100, amount % 100))
    }
}

pub async fn sync_plan_catalog(
    pool: &DieselPool,
    stripe: &StripeClient,
) -> Result<usize, ApiError> {
    let products = stripe
        .list_active_products()
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let mut new_plans = Vec::with_capacity(products.len());
    for product in products {
        let prices = stripe
            .list_prices_for_product(&product.id)
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let monthly = prices
            .iter()
            .find(|p| matches!(&p.recurring, Some(r) if r.interval == "month"));
        let yearly = prices
            .iter()
            .find(|p| matches!(&p.recurring, Some(r) if r.interval == "year"));

        let description_en = product.description.clone().unwrap_or_default();
        let description_ja = product
            .metadata
            .get("description_ja")
            .cloned()
            .unwrap_or_else(|| description_en.clone());
        let session = product
            .metadata
            .get("session")
            .cloned()
            .unwrap_or_default();

        new_plans.push(NewPlan {
            name: product.name,
            stripe_product_id: product.id,
            description_en,
            description_ja,
            session,
            monthly_price: monthly.and_then(format_amount),
            yearly_price: yearly.and_then(format_amount),
            monthly_price_id: monthly.map(|p| p.id.clone()),
            yearly_price_id: yearly.map(|p| p.id.clone()),
        });
    }

    let mut conn = pool.get().await?;
    let count = conn
        .transaction::<_, diesel::result::Error, _>(|conn| {
            let new_plans = new_plans;
            async move { replace_catalog(conn, &new_plans).await }.scope_boxed()
        })
        .await?;

    tracing::info!(plans = count, "plan catalog synced");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stripe::Recurring;

    fn price(amount: i64, currency: &str) -> Price {
        Price {
            id: "price_x".to_string(),
            unit_amount: Some(amount),
            currency: Some(currency.to_string()),
            recurring: Some(Recurring {
                interval: "month".to_string(),
            }),
        }
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(&price(1200, "usd")), Some("12.00".to_string()));
        assert_eq!(format_amount(&price(980, "jpy")), Some("980".to_string()));
        assert_eq!(
            format_amount(&Price {
                id: "p".to_string(),
                unit_amount: None,
                currency: None,
                recurring: None,
            }),
            None
        );
    }
}
