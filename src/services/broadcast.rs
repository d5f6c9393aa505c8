// Broadcast fan-out
// Persistence is transactional: the message row and its receiver rows commit
// or roll back together. Push delivery happens after commit and is always
// best-effort; failures are counted and reported, never rolled back.
//
// Eligibility is evaluated against a single captured instant so every
// candidate in one broadcast sees the same clock.

use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use std::collections::HashMap;

use crate::db::DieselPool;
use crate::middleware::auth::Role;
use crate::models::client::Client;
use crate::models::message::{Message, NewMessage, NewMessageReceiver};
use crate::models::plan::Plan;
use crate::schema::{user_logs, users};
use crate::services::push::{PushNotification, PushSender};
use crate::utils::api_error::ApiError;
use crate::utils::time::tokyo_time_of_day;

/// Time-of-day window a session category grants, in Tokyo wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionWindow {
    /// 06:00 through 15:30 inclusive
    Day,
    /// 16:00 onward, wrapping through midnight to 06:00 inclusive
    Night,
    /// Union of the day and night windows
    AllDay,
}

impl SessionWindow {
    pub fn from_category(category: &str) -> Option<SessionWindow> {
        match category {
            "0" => Some(SessionWindow::Day),
            "1" => Some(SessionWindow::Night),
            "2" => Some(SessionWindow::AllDay),
            _ => None,
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let day_start = NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN);
        let day_end = NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN);
        let night_start = NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN);

        match self {
            SessionWindow::Day => time >= day_start && time <= day_end,
            SessionWindow::Night => time >= night_start || time <= day_start,
            SessionWindow::AllDay => {
                SessionWindow::Day.contains(time) || SessionWindow::Night.contains(time)
            },
        }
    }
}

/// Price-id to session-window lookup built from the plan catalog
#[derive(Debug, Default)]
pub struct SessionCatalog {
    windows: HashMap<String, SessionWindow>,
}

impl SessionCatalog {
    pub fn from_plans(plans: &[Plan]) -> Self {
        let mut windows = HashMap::new();
        for plan in plans {
            let Some(window) = SessionWindow::from_category(&plan.session) else {
                continue;
            };
            for price_id in [&plan.monthly_price_id, &plan.yearly_price_id]
                .into_iter()
                .flatten()
            {
                windows.insert(price_id.clone(), window);
            }
        }
        Self { windows }
    }

    pub fn window_for(&self, price_id: &str) -> Option<SessionWindow> {
        self.windows.get(price_id).copied()
    }
}

/// One user's subscription state as seen by the eligibility check
#[derive(Debug, Clone)]
pub struct CandidateLog {
    /// Stripe price id of the active plan; None means a legacy account with
    /// no plan restriction
    pub plan: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
}

impl CandidateLog {
    fn covers(&self, epoch_ms: i64) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= epoch_ms && epoch_ms <= end,
            _ => false,
        }
    }
}

/// Whether a user receives a broadcast sent at the captured instant.
///
/// Elevated accounts always receive. Everyone else needs a subscription row
/// whose coverage interval contains the instant; plan-bound accounts
/// additionally need the current Tokyo time to fall inside their session
/// window. An unknown price id grants nothing.
pub fn is_eligible(
    role: Role,
    log: Option<&CandidateLog>,
    catalog: &SessionCatalog,
    now_ms: i64,
    now_tokyo: NaiveTime,
) -> bool {
    if role.is_elevated() {
        return true;
    }
    let Some(log) = log else {
        return false;
    };
    if !log.covers(now_ms) {
        return false;
    }
    match &log.plan {
        None => true,
        Some(price_id) => catalog
            .window_for(price_id)
            .map_or(false, |window| window.contains(now_tokyo)),
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastInput {
    pub kind: Option<String>,
    pub code: Option<String>,
    pub body: Option<String>,
}

/// Result of one broadcast: the persisted message plus delivery counters
#[derive(Debug)]
pub struct BroadcastOutcome {
    pub message: Message,
    pub receiver_count: usize,
    pub pushes_attempted: usize,
    pub pushes_failed: usize,
}

#[derive(Debug, Queryable)]
struct CandidateRow {
    user_id: i32,
    role: String,
    plan: Option<String>,
    start_date: Option<i64>,
    end_date: Option<i64>,
}

/// Persist a broadcast and fan it out.
///
/// Addressing is decided inside one transaction from a snapshot of users,
/// subscription state and the plan catalog. Push delivery runs after commit
/// against the distinct device tokens of the addressed users.
pub async fn broadcast(
    pool: &DieselPool,
    push: &dyn PushSender,
    sender_id: i32,
    input: BroadcastInput,
    now: DateTime<Utc>,
) -> Result<BroadcastOutcome, ApiError> {
    let now_ms = now.timestamp_millis();
    let now_tokyo = tokyo_time_of_day(now);

    let mut conn = pool.get().await?;

    let (message, receiver_ids) = conn
        .transaction::<_, diesel::result::Error, _>(|conn| {
            let input = input.clone();
            async move {
                let message = NewMessage {
                    sender_id,
                    kind: input.kind.as_deref(),
                    code: input.code.as_deref(),
                    body: input.body.as_deref(),
                    created_at: now_ms,
                }
                .insert(conn)
                .await?;

                let candidates: Vec<CandidateRow> = users::table
                    .left_join(user_logs::table)
                    .select((
                        users::id,
                        users::role,
                        user_logs::plan.nullable(),
                        user_logs::start_date.nullable(),
                        user_logs::end_date.nullable(),
                    ))
                    .load(conn)
                    .await?;

                let catalog = SessionCatalog::from_plans(&Plan::list_all(conn).await?);

                let receiver_ids: Vec<i32> = candidates
                    .into_iter()
                    .filter(|row| {
                        let Some(role) = Role::parse(&row.role) else {
                            return false;
                        };
                        let log = CandidateLog {
                            plan: row.plan.clone(),
                            start_date: row.start_date,
                            end_date: row.end_date,
                        };
                        is_eligible(role, Some(&log), &catalog, now_ms, now_tokyo)
                    })
                    .map(|row| row.user_id)
                    .collect();

                NewMessageReceiver::insert_batch(conn, message.id, &receiver_ids).await?;

                Ok((message, receiver_ids))
            }
            .scope_boxed()
        })
        .await?;

    let tokens = Client::tokens_for_users(&mut conn, &receiver_ids).await?;
    drop(conn);

    let notification = PushNotification::new("New Message", "Click to view")
        .with_data("timestamp", message.created_at.to_string())
        .with_data("kind", message.kind.clone().unwrap_or_default())
        .with_data("code", message.code.clone().unwrap_or_default())
        .with_data("body", message.body.clone().unwrap_or_default());

    let mut failed = 0;
    for token in &tokens {
        if let Err(e) = push.send(token, &notification).await {
            failed += 1;
            tracing::warn!(message_id = message.id, error = %e, "push delivery failed");
        }
    }

    tracing::info!(
        message_id = message.id,
        receivers = receiver_ids.len(),
        pushes = tokens.len(),
        failed,
        "broadcast complete"
    );

    Ok(BroadcastOutcome {
        message,
        receiver_count: receiver_ids.len(),
        pushes_attempted: tokens.len(),
        pushes_failed: failed,
    })
}

/// Send a best-effort notification to every device of one user.
/// Used outside broadcasts (payment confirmations); failures are only logged.
pub async fn notify_user(
    pool: &DieselPool,
    push: &dyn PushSender,
    user_id: i32,
    notification: &PushNotification,
) -> Result<(usize, usize), ApiError> {
    let mut conn = pool.get().await?;
    let tokens = Client::tokens_for_user(&mut conn, user_id).await?;
    drop(conn);

    let mut failed = 0;
    for token in &tokens {
        if let Err(e) = push.send(token, notification).await {
            failed += 1;
            tracing::warn!(user_id, error = %e, "push delivery failed");
        }
    }
    Ok((tokens.len(), failed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn plan(session: &str, monthly: Option<&str>, yearly: Option<&str>) -> Plan {
        Plan {
            id: 1,
            name: "Test".to_string(),
            stripe_product_id: "prod_test".to_string(),
            description_en: String::new(),
            description_ja: String::new(),
            session: session.to_string(),
            monthly_price: None,
            yearly_price: None,
            monthly_price_id: monthly.map(String::from),
            yearly_price_id: yearly.map(String::from),
        }
    }

    fn covered_log(plan: Option<&str>) -> CandidateLog {
        CandidateLog {
            plan: plan.map(String::from),
            start_date: Some(0),
            end_date: Some(i64::MAX),
        }
    }

    #[test]
    fn test_day_window_boundaries() {
        let w = SessionWindow::Day;
        assert!(w.contains(t(6, 0)));
        assert!(w.contains(t(10, 0)));
        assert!(w.contains(t(15, 30)));
        assert!(!w.contains(t(5, 59)));
        assert!(!w.contains(t(15, 31)));
        assert!(!w.contains(t(23, 0)));
    }

    #[test]
    fn test_night_window_wraps_midnight() {
        let w = SessionWindow::Night;
        assert!(w.contains(t(16, 0)));
        assert!(w.contains(t(23, 0)));
        assert!(w.contains(t(0, 0)));
        assert!(w.contains(t(6, 0)));
        assert!(!w.contains(t(10, 0)));
        assert!(!w.contains(t(15, 45)));
    }

    #[test]
    fn test_all_day_window_is_the_union() {
        let w = SessionWindow::AllDay;
        assert!(w.contains(t(10, 0)));
        assert!(w.contains(t(23, 0)));
        // The union leaves a gap between the day and night windows
        assert!(!w.contains(t(15, 45)));
    }

    #[test]
    fn test_catalog_maps_both_price_ids() {
        let catalog = SessionCatalog::from_plans(&[
            plan("0", Some("price_day_m"), Some("price_day_y")),
            plan("1", Some("price_night_m"), None),
            plan("bogus", Some("price_ignored"), None),
        ]);

        assert_eq!(catalog.window_for("price_day_m"), Some(SessionWindow::Day));
        assert_eq!(catalog.window_for("price_day_y"), Some(SessionWindow::Day));
        assert_eq!(
            catalog.window_for("price_night_m"),
            Some(SessionWindow::Night)
        );
        assert_eq!(catalog.window_for("price_ignored"), None);
        assert_eq!(catalog.window_for("price_unknown"), None);
    }

    #[test]
    fn test_elevated_roles_are_always_eligible() {
        let catalog = SessionCatalog::default();
        for role in [Role::Admin, Role::SuperAdmin] {
            assert!(is_eligible(role, None, &catalog, 0, t(3, 0)));
        }
    }

    #[test]
    fn test_user_without_subscription_state_is_ineligible() {
        let catalog = SessionCatalog::default();
        assert!(!is_eligible(Role::User, None, &catalog, 0, t(10, 0)));
    }

    #[test]
    fn test_coverage_is_required_even_without_a_plan() {
        let catalog = SessionCatalog::default();
        let expired = CandidateLog {
            plan: None,
            start_date: Some(0),
            end_date: Some(100),
        };
        assert!(!is_eligible(Role::User, Some(&expired), &catalog, 200, t(10, 0)));
        assert!(is_eligible(Role::User, Some(&expired), &catalog, 50, t(10, 0)));
    }

    #[test]
    fn test_plan_free_covered_user_is_eligible_at_any_hour() {
        let catalog = SessionCatalog::default();
        let log = covered_log(None);
        for hour in 0..24 {
            assert!(is_eligible(Role::User, Some(&log), &catalog, 1, t(hour, 0)));
        }
    }

    #[test]
    fn test_day_plan_user_follows_the_day_window() {
        let catalog = SessionCatalog::from_plans(&[plan("0", Some("price_day"), None)]);
        let log = covered_log(Some("price_day"));

        assert!(is_eligible(Role::User, Some(&log), &catalog, 1, t(10, 0)));
        assert!(!is_eligible(Role::User, Some(&log), &catalog, 1, t(16, 30)));
    }

    #[test]
    fn test_night_plan_user_follows_the_night_window() {
        let catalog = SessionCatalog::from_plans(&[plan("1", Some("price_night"), None)]);
        let log = covered_log(Some("price_night"));

        assert!(is_eligible(Role::User, Some(&log), &catalog, 1, t(23, 0)));
        assert!(!is_eligible(Role::User, Some(&log), &catalog, 1, t(10, 0)));
    }

    #[test]
    fn test_unknown_price_id_grants_nothing() {
        let catalog = SessionCatalog::from_plans(&[plan("0", Some("price_day"), None)]);
        let log = covered_log(Some("price_gone"));

        for hour in 0..24 {
            assert!(!is_eligible(Role::User, Some(&log), &catalog, 1, t(hour, 0)));
        }
    }
}
