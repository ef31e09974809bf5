use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::nudge::{RuleCode, Severity};

/// One nudge shown to a user. Append-only: rows are never deleted, and the
/// only mutation is setting `dismissed_at`. Cooldown lookups read `shown_at`
/// regardless of dismissal.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct NudgeDelivery {
    pub id: i64,
    pub user_id: i64,
    pub rule_code: RuleCode,
    pub message: String,
    pub severity: Severity,
    pub shown_at: NaiveDateTime,
    pub dismissed_at: Option<NaiveDateTime>,
    /// Legacy column; mute state lives in nudge_preferences.
    pub muted_until: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}
