// Shared harness for database-backed integration tests.
// Tests are skipped unless TEST_DATABASE_URL points at a disposable Postgres
// database; each test truncates the tables it touches and runs serially.

use async_trait::async_trait;
use bb8::Pool;
use diesel::{Connection, PgConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::MigrationHarness;
use std::sync::Mutex;

use niko_backend_core::db::diesel_pool::MIGRATIONS;
use niko_backend_core::db::DieselPool;
use niko_backend_core::services::push::{PushError, PushNotification, PushSender};

pub fn test_database_url() -> Option<String> {
    dotenv::dotenv().ok();
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Build a pool against the test database, applying migrations first.
/// Returns None (and the caller should skip) when no test database is set.
pub async fn setup_pool() -> Option<DieselPool> {
    let url = test_database_url()?;

    let mut conn = PgConnection::establish(&url).expect("connect to test database");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("run migrations");
    drop(conn);

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .await
        .expect("build pool");

    Some(pool)
}

pub async fn truncate_all(pool: &DieselPool) {
    let mut conn = pool.get().await.expect("checkout");
    diesel::sql_query(
        "TRUNCATE message_receivers, messages, clients, user_logs, payments, enquiries, \
         plans, news, ads, users RESTART IDENTITY CASCADE",
    )
    .execute(&mut conn)
    .await
    .expect("truncate");
}

/// Push sender that records instead of delivering
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<(String, PushNotification)>>,
    /// Tokens that should fail delivery
    pub failing_tokens: Vec<String>,
}

impl RecordingPush {
    pub fn sent_tokens(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("lock")
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> Result<(), PushError> {
        if self.failing_tokens.iter().any(|t| t == device_token) {
            return Err(PushError::Request("simulated failure".to_string()));
        }
        self.sent
            .lock()
            .expect("lock")
            .push((device_token.to_string(), notification.clone()));
        Ok(())
    }
}
