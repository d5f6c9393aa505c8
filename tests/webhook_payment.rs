// Payment webhook processing against a real database, with a local stub
// standing in for the Stripe API. Requires TEST_DATABASE_URL.

mod common;

use axum::{extract::Path, routing::get, Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::{json, Value};
use serial_test::serial;

use common::{setup_pool, truncate_all, RecordingPush};
use niko_backend_core::db::DieselPool;
use niko_backend_core::models::user::{NewUser, User};
use niko_backend_core::models::user_log::UserLog;
use niko_backend_core::schema::payments;
use niko_backend_core::services::stripe::{StripeClient, WebhookEvent};
use niko_backend_core::services::subscription::{handle_webhook_event, WebhookOutcome};
use niko_backend_core::utils::time::{end_of_day_ms, start_of_day_ms};

const PERIOD_START: i64 = 1_740_787_200; // 2025-03-01 00:00 UTC, seconds
const PERIOD_END: i64 = 1_743_379_200; // 2025-03-31 00:00 UTC, seconds

async fn start_stripe_stub() -> String {
    async fn subscription(Path(id): Path<String>) -> Json<Value> {
        let status = match id.as_str() {
            "sub_active" => "active",
            "sub_trialing" => "trialing",
            _ => "canceled",
        };
        Json(json!({
            "id": id,
            "status": status,
            "current_period_start": PERIOD_START,
            "current_period_end": PERIOD_END,
            "items": {
                "data": [
                    { "price": { "id": "price_day" } }
                ]
            }
        }))
    }

    let router = Router::new().route("/subscriptions/{id}", get(subscription));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

fn payment_event(invoice_id: &str, customer: &str, subscription: &str) -> WebhookEvent {
    serde_json::from_value(json!({
        "type": "invoice.payment_succeeded",
        "data": {
            "object": {
                "id": invoice_id,
                "customer": customer,
                "subscription": subscription,
            }
        }
    }))
    .expect("valid event")
}

async fn insert_subscriber(pool: &DieselPool, email: &str, customer_id: &str) -> i32 {
    let mut conn = pool.get().await.expect("checkout");
    let user = NewUser {
        first_name: Some("Pay"),
        last_name: None,
        dob: None,
        phone: None,
        email,
        country: None,
        state: None,
        city: None,
        password_hash: "$argon2id$v=19$m=4096,t=1,p=1$c2FsdHNhbHQ$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        role: "user",
        is_japanese: true,
    }
    .insert(&mut conn)
    .await
    .expect("insert user");
    User::set_stripe_customer(&mut conn, user.id, customer_id)
        .await
        .expect("set customer");
    user.id
}

async fn payment_count(pool: &DieselPool) -> i64 {
    let mut conn = pool.get().await.expect("checkout");
    payments::table
        .count()
        .get_result(&mut conn)
        .await
        .expect("count")
}

#[tokio::test]
#[serial]
async fn payment_succeeded_records_payment_and_updates_subscription_state() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    let api_base = start_stripe_stub().await;
    let stripe = StripeClient::new("sk_test".to_string(), "whsec_test".to_string(), api_base);
    let push = RecordingPush::default();

    let user_id = insert_subscriber(&pool, "payer@test.io", "cus_1").await;
    insert_device(&pool, user_id).await;

    let outcome = handle_webhook_event(
        &pool,
        &push,
        &stripe,
        payment_event("in_100", "cus_1", "sub_active"),
    )
    .await
    .expect("handle event");

    assert_eq!(
        outcome,
        WebhookOutcome::Processed {
            user_id,
            newly_recorded: true,
        }
    );
    assert_eq!(payment_count(&pool).await, 1);

    let mut conn = pool.get().await.expect("checkout");
    let log = UserLog::find_by_user(&mut conn, user_id)
        .await
        .expect("load log")
        .expect("log exists");
    drop(conn);

    // Coverage is the paid period widened to full Tokyo days
    assert_eq!(log.start_date, Some(start_of_day_ms(PERIOD_START * 1000)));
    assert_eq!(log.end_date, Some(end_of_day_ms(PERIOD_END * 1000)));
    assert_eq!(log.payment_id.as_deref(), Some("in_100"));
    assert_eq!(log.subscription_id.as_deref(), Some("sub_active"));
    assert_eq!(log.plan.as_deref(), Some("price_day"));

    // The confirmation push went to the user's device
    assert_eq!(push.sent_tokens(), vec!["tok-payer"]);
}

#[tokio::test]
#[serial]
async fn replayed_invoice_is_idempotent() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    let api_base = start_stripe_stub().await;
    let stripe = StripeClient::new("sk_test".to_string(), "whsec_test".to_string(), api_base);
    let push = RecordingPush::default();

    let user_id = insert_subscriber(&pool, "payer@test.io", "cus_1").await;

    let first = handle_webhook_event(
        &pool,
        &push,
        &stripe,
        payment_event("in_100", "cus_1", "sub_active"),
    )
    .await
    .expect("first event");
    let second = handle_webhook_event(
        &pool,
        &push,
        &stripe,
        payment_event("in_100", "cus_1", "sub_active"),
    )
    .await
    .expect("second event");

    assert_eq!(
        first,
        WebhookOutcome::Processed {
            user_id,
            newly_recorded: true,
        }
    );
    assert_eq!(
        second,
        WebhookOutcome::Processed {
            user_id,
            newly_recorded: false,
        }
    );
    assert_eq!(payment_count(&pool).await, 1);
}

#[tokio::test]
#[serial]
async fn inactive_subscriptions_and_foreign_events_are_ignored() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    let api_base = start_stripe_stub().await;
    let stripe = StripeClient::new("sk_test".to_string(), "whsec_test".to_string(), api_base);
    let push = RecordingPush::default();

    insert_subscriber(&pool, "payer@test.io", "cus_1").await;

    let canceled = handle_webhook_event(
        &pool,
        &push,
        &stripe,
        payment_event("in_200", "cus_1", "sub_canceled"),
    )
    .await
    .expect("canceled event");
    assert_eq!(canceled, WebhookOutcome::Ignored);

    // Trials have not paid; their invoices must not mutate state either
    let trialing = handle_webhook_event(
        &pool,
        &push,
        &stripe,
        payment_event("in_300", "cus_1", "sub_trialing"),
    )
    .await
    .expect("trialing event");
    assert_eq!(trialing, WebhookOutcome::Ignored);

    let foreign: WebhookEvent = serde_json::from_value(json!({
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    }))
    .expect("valid event");
    let ignored = handle_webhook_event(&pool, &push, &stripe, foreign)
        .await
        .expect("foreign event");
    assert_eq!(ignored, WebhookOutcome::Ignored);

    assert_eq!(payment_count(&pool).await, 0);
    assert!(push.sent_tokens().is_empty());
}

async fn insert_device(pool: &DieselPool, user_id: i32) {
    use niko_backend_core::schema::clients;
    let mut conn = pool.get().await.expect("checkout");
    diesel::insert_into(clients::table)
        .values((
            clients::user_id.eq(user_id),
            clients::device_token.eq("tok-payer"),
            clients::platform.eq("ios"),
        ))
        .execute(&mut conn)
        .await
        .expect("insert client");
}
