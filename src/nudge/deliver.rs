use chrono::NaiveDateTime;
use sqlx::{Pool, Sqlite};

use super::{RuleCode, Severity};
use crate::database::db::queries;
use crate::database::models::NudgeDelivery;
use crate::push;

/// Persist a surviving candidate to the delivery log and return the row.
/// Warning/high nudges also attempt push dispatch on a detached task; its
/// failure or latency never reaches the caller.
pub async fn deliver_nudge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    rule_code: RuleCode,
    message: &str,
    severity: Severity,
    now: NaiveDateTime,
) -> Result<NudgeDelivery, sqlx::Error> {
    let delivery =
        queries::insert_delivery(pool, user_id, rule_code, message, severity, now).await?;

    if severity.wants_push() {
        let pool = pool.clone();
        let body = message.to_string();
        tokio::spawn(async move {
            if let Err(e) = push::send_to_user(&pool, user_id, &body).await {
                tracing::warn!(user_id, error = %e, "push dispatch failed");
            }
        });
    }

    Ok(delivery)
}
