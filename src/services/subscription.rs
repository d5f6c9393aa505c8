// Stripe webhook processing
// Only invoice.payment_succeeded mutates state. The payment record and the
// subscription-state update commit in one transaction keyed by the invoice id,
// so webhook replays are idempotent. The confirmation push runs after commit
// and is best-effort.

use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;

use crate::db::DieselPool;
use crate::models::payment::NewPayment;
use crate::models::user::User;
use crate::models::user_log::{UserLog, UserLogUpdate};
use crate::services::broadcast::notify_user;
use crate::services::push::{PushNotification, PushSender};
use crate::services::stripe::{Invoice, StripeClient, WebhookEvent};
use crate::utils::api_error::ApiError;
use crate::utils::time::{end_of_day_ms, start_of_day_ms};

pub const EVENT_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";

/// What handling a webhook event did
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event type not handled, or the payload did not reference a usable
    /// customer or subscription
    Ignored,
    /// Payment recorded (or replayed) and subscription state updated
    Processed {
        user_id: i32,
        newly_recorded: bool,
    },
}

pub async fn handle_webhook_event(
    pool: &DieselPool,
    push: &dyn PushSender,
    stripe: &StripeClient,
    event: WebhookEvent,
) -> Result<WebhookOutcome, ApiError> {
    if event.event_type != EVENT_PAYMENT_SUCCEEDED {
        tracing::debug!(event_type = %event.event_type, "ignoring webhook event");
        return Ok(WebhookOutcome::Ignored);
    }

    let invoice: Invoice = serde_json::from_value(event.data.object)
        .map_err(|e| ApiError::bad_request(format!("malformed invoice payload: {}", e)))?;

    let (Some(customer_id), Some(subscription_id)) = (&invoice.customer, &invoice.subscription)
    else {
        tracing::warn!(invoice = %invoice.id, "invoice without customer or subscription");
        return Ok(WebhookOutcome::Ignored);
    };

    let subscription = stripe
        .retrieve_subscription(subscription_id)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    if !subscription.is_active() {
        tracing::info!(
            invoice = %invoice.id,
            status = %subscription.status,
            "subscription not active, skipping"
        );
        return Ok(WebhookOutcome::Ignored);
    }

    let mut conn = pool.get().await?;

    let user = User::find_by_stripe_customer(&mut conn, customer_id).await?;
    let Some(user) = user else {
        tracing::warn!(customer = %customer_id, "no account for Stripe customer");
        return Ok(WebhookOutcome::Ignored);
    };

    let period_start_ms = subscription.current_period_start * 1000;
    let period_end_ms = subscription.current_period_end * 1000;
    let price_id = subscription.first_price_id().map(String::from);

    let newly_recorded = conn
        .transaction::<_, diesel::result::Error, _>(|conn| {
            let invoice_id = invoice.id.clone();
            let subscription_id = subscription.id.clone();
            let price_id = price_id.clone();
            let user_id = user.id;
            async move {
                let newly_recorded = NewPayment {
                    id: &invoice_id,
                    user_id,
                    period_start: Some(period_start_ms),
                    period_end: Some(period_end_ms),
                }
                .insert_if_absent(conn)
                .await?;

                UserLog::create_empty(conn, user_id).await?;
                UserLogUpdate {
                    payment_id: Some(&invoice_id),
                    subscription_id: Some(&subscription_id),
                    start_date: Some(start_of_day_ms(period_start_ms)),
                    end_date: Some(end_of_day_ms(period_end_ms)),
                    plan: price_id.as_deref(),
                }
                .apply(conn, user_id)
                .await?;

                Ok(newly_recorded)
            }
            .scope_boxed()
        })
        .await?;
    drop(conn);

    let notification = PushNotification::new("Subscription updated", "Your payment was received")
        .with_data("invoice", invoice.id.clone());
    let (attempted, failed) = notify_user(pool, push, user.id, &notification).await?;

    tracing::info!(
        invoice = %invoice.id,
        user_id = user.id,
        newly_recorded,
        pushes = attempted,
        failed,
        "payment webhook processed"
    );

    Ok(WebhookOutcome::Processed {
        user_id: user.id,
        newly_recorded,
    })
}
