use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::nudge::RuleCode;

/// Per-user, per-rule mute/disable state. At most one row per
/// (user_id, rule_code), enforced by a unique index.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct NudgePreference {
    pub id: i64,
    pub user_id: i64,
    pub rule_code: RuleCode,
    pub muted_until: Option<NaiveDateTime>,
    pub disabled: bool,
    pub updated_at: NaiveDateTime,
}
