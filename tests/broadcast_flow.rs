// Broadcast fan-out against a real database.
// Requires TEST_DATABASE_URL; each test is skipped otherwise.

mod common;

use chrono::{TimeZone, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serial_test::serial;

use common::{setup_pool, truncate_all, RecordingPush};
use niko_backend_core::db::DieselPool;
use niko_backend_core::models::message::{Message, NewMessage, NewMessageReceiver};
use niko_backend_core::models::user::NewUser;
use niko_backend_core::schema::{clients, message_receivers, messages, plans, user_logs};
use niko_backend_core::services::broadcast::{broadcast, BroadcastInput};

async fn insert_user(pool: &DieselPool, email: &str, role: &str) -> i32 {
    let mut conn = pool.get().await.expect("checkout");
    NewUser {
        first_name: Some("Test"),
        last_name: None,
        dob: None,
        phone: None,
        email,
        country: None,
        state: None,
        city: None,
        password_hash: "$argon2id$v=19$m=4096,t=1,p=1$c2FsdHNhbHQ$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        role,
        is_japanese: true,
    }
    .insert(&mut conn)
    .await
    .expect("insert user")
    .id
}

async fn insert_log(
    pool: &DieselPool,
    user_id: i32,
    plan: Option<&str>,
    start: i64,
    end: i64,
) {
    let mut conn = pool.get().await.expect("checkout");
    diesel::insert_into(user_logs::table)
        .values((
            user_logs::user_id.eq(user_id),
            user_logs::plan.eq(plan),
            user_logs::start_date.eq(start),
            user_logs::end_date.eq(end),
        ))
        .execute(&mut conn)
        .await
        .expect("insert user_log");
}

async fn insert_device(pool: &DieselPool, user_id: i32, token: &str) {
    let mut conn = pool.get().await.expect("checkout");
    diesel::insert_into(clients::table)
        .values((
            clients::user_id.eq(user_id),
            clients::device_token.eq(token),
            clients::platform.eq("android"),
        ))
        .execute(&mut conn)
        .await
        .expect("insert client");
}

async fn insert_day_plan(pool: &DieselPool, price_id: &str) {
    let mut conn = pool.get().await.expect("checkout");
    diesel::insert_into(plans::table)
        .values((
            plans::name.eq("Day"),
            plans::stripe_product_id.eq("prod_day"),
            plans::description_en.eq(""),
            plans::description_ja.eq(""),
            plans::session.eq("0"),
            plans::monthly_price_id.eq(price_id),
        ))
        .execute(&mut conn)
        .await
        .expect("insert plan");
}

async fn receiver_ids(pool: &DieselPool, message_id: i32) -> Vec<i32> {
    let mut conn = pool.get().await.expect("checkout");
    let mut ids: Vec<i32> = message_receivers::table
        .filter(message_receivers::message_id.eq(message_id))
        .select(message_receivers::receiver_id)
        .load(&mut conn)
        .await
        .expect("load receivers");
    ids.sort_unstable();
    ids
}

// 01:00 UTC is 10:00 in Tokyo, inside the day window
fn ten_am_tokyo() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0)
        .single()
        .expect("valid datetime")
}

#[tokio::test]
#[serial]
async fn broadcast_addresses_eligible_users_and_fans_out_once_per_device() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    let now = ten_am_tokyo();
    let now_ms = now.timestamp_millis();

    let admin = insert_user(&pool, "admin@test.io", "admin").await;
    let legacy = insert_user(&pool, "legacy@test.io", "user").await;
    let day_user = insert_user(&pool, "day@test.io", "user").await;
    let expired = insert_user(&pool, "expired@test.io", "user").await;

    insert_day_plan(&pool, "price_day").await;
    insert_log(&pool, legacy, None, now_ms - 1000, now_ms + 1000).await;
    insert_log(&pool, day_user, Some("price_day"), now_ms - 1000, now_ms + 1000).await;
    insert_log(&pool, expired, None, 0, now_ms - 1).await;

    insert_device(&pool, legacy, "tok-legacy-1").await;
    insert_device(&pool, legacy, "tok-legacy-2").await;
    insert_device(&pool, day_user, "tok-day-1").await;
    insert_device(&pool, day_user, "tok-day-2").await;
    insert_device(&pool, expired, "tok-expired").await;

    let push = RecordingPush::default();
    let outcome = broadcast(
        &pool,
        &push,
        admin,
        BroadcastInput {
            kind: Some("a1".to_string()),
            code: Some("123456".to_string()),
            body: Some("hello".to_string()),
        },
        now,
    )
    .await
    .expect("broadcast");

    // The admin, the legacy user and the day-plan user are addressed; the
    // expired user is not
    let mut expected = vec![admin, legacy, day_user];
    expected.sort_unstable();
    assert_eq!(receiver_ids(&pool, outcome.message.id).await, expected);
    assert_eq!(outcome.receiver_count, 3);

    // The stored timestamp is the captured broadcast instant
    assert_eq!(outcome.message.created_at, now_ms);

    // One push per device of the addressed users only
    let mut tokens = push.sent_tokens();
    tokens.sort();
    assert_eq!(
        tokens,
        vec!["tok-day-1", "tok-day-2", "tok-legacy-1", "tok-legacy-2"]
    );
    assert_eq!(outcome.pushes_attempted, 4);
    assert_eq!(outcome.pushes_failed, 0);

    // Every device sees the same message id payload
    let sent = push.sent.lock().expect("lock");
    for (_, notification) in sent.iter() {
        assert_eq!(
            notification.data.get("timestamp"),
            Some(&outcome.message.created_at.to_string())
        );
        assert_eq!(notification.data.get("code"), Some(&"123456".to_string()));
    }
}

#[tokio::test]
#[serial]
async fn broadcast_excludes_day_plan_users_outside_their_window() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    // 14:00 UTC is 23:00 in Tokyo, outside the day window
    let now = Utc
        .with_ymd_and_hms(2025, 3, 1, 14, 0, 0)
        .single()
        .expect("valid datetime");
    let now_ms = now.timestamp_millis();

    let admin = insert_user(&pool, "admin@test.io", "admin").await;
    let day_user = insert_user(&pool, "day@test.io", "user").await;

    insert_day_plan(&pool, "price_day").await;
    insert_log(&pool, day_user, Some("price_day"), now_ms - 1000, now_ms + 1000).await;
    insert_device(&pool, day_user, "tok-day").await;

    let push = RecordingPush::default();
    let outcome = broadcast(
        &pool,
        &push,
        admin,
        BroadcastInput {
            kind: None,
            code: None,
            body: Some("evening".to_string()),
        },
        now,
    )
    .await
    .expect("broadcast");

    assert_eq!(receiver_ids(&pool, outcome.message.id).await, vec![admin]);
    assert!(push.sent_tokens().is_empty());
}

#[tokio::test]
#[serial]
async fn failed_receiver_insert_rolls_back_the_message() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    let now_ms = ten_am_tokyo().timestamp_millis();
    let admin = insert_user(&pool, "admin@test.io", "admin").await;

    // The same insert pair the fan-out runs, with a receiver id that has no
    // user row; the foreign key rejects it mid-transaction
    let mut conn = pool.get().await.expect("checkout");
    let result = conn
        .transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                let message = NewMessage {
                    sender_id: admin,
                    kind: None,
                    code: None,
                    body: Some("doomed"),
                    created_at: now_ms,
                }
                .insert(conn)
                .await?;

                NewMessageReceiver::insert_batch(conn, message.id, &[admin, admin + 1000]).await
            }
            .scope_boxed()
        })
        .await;
    assert!(result.is_err());

    // The message row rolled back with the receivers
    let count: i64 = messages::table
        .count()
        .get_result(&mut conn)
        .await
        .expect("count messages");
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn push_failures_do_not_undo_persistence() {
    let Some(pool) = setup_pool().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    truncate_all(&pool).await;

    let now = ten_am_tokyo();
    let now_ms = now.timestamp_millis();

    let admin = insert_user(&pool, "admin@test.io", "admin").await;
    let user = insert_user(&pool, "user@test.io", "user").await;
    insert_log(&pool, user, None, now_ms - 1000, now_ms + 1000).await;
    insert_device(&pool, user, "tok-ok").await;
    insert_device(&pool, user, "tok-bad").await;

    let push = RecordingPush {
        failing_tokens: vec!["tok-bad".to_string()],
        ..Default::default()
    };
    let outcome = broadcast(
        &pool,
        &push,
        admin,
        BroadcastInput {
            kind: None,
            code: None,
            body: Some("partial".to_string()),
        },
        now,
    )
    .await
    .expect("broadcast");

    assert_eq!(outcome.pushes_attempted, 2);
    assert_eq!(outcome.pushes_failed, 1);

    // Receiver rows and the message survive the failed delivery
    assert_eq!(
        receiver_ids(&pool, outcome.message.id).await.len(),
        2
    );
    let mut conn = pool.get().await.expect("checkout");
    let history = Message::list_for_receiver(&mut conn, user).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, outcome.message.id);
}
