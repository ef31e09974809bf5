use chrono::{Duration, NaiveDateTime};
use sqlx::{Pool, Sqlite};

use super::RuleCode;
use crate::database::db::queries;

/// Decide whether a rule's candidate must be dropped, in order:
/// disabled preference, active mute, then cooldown against the delivery
/// log. Read-only; the caller persists nothing when this returns true.
pub async fn should_skip_nudge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    rule_code: RuleCode,
    now: NaiveDateTime,
) -> Result<bool, sqlx::Error> {
    if let Some(pref) = queries::get_preference(pool, user_id, rule_code).await? {
        if pref.disabled {
            return Ok(true);
        }
        if let Some(muted_until) = pref.muted_until {
            if muted_until > now {
                return Ok(true);
            }
        }
    }

    let since = now - Duration::hours(rule_code.cooldown_hours());
    queries::has_delivery_since(pool, user_id, rule_code, since).await
}
