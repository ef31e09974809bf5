use chrono::NaiveDateTime;
use sqlx::{Pool, Sqlite};

use super::{rules, RuleCode, ALL_RULES};
use crate::database::models::NudgeDelivery;

/// Run every rule for one user and return the deliveries created this
/// invocation. Called when a client asks for nudges with the check flag,
/// or right after an expense is logged.
pub async fn run_nudge_checks(pool: &Pool<Sqlite>, user_id: i64) -> Vec<NudgeDelivery> {
    run_nudge_checks_at(pool, user_id, chrono::Local::now().naive_local()).await
}

/// Rules run sequentially in a fixed order so output is stable. Each rule
/// is isolated: a failing rule is logged and skipped, the rest still run.
pub async fn run_nudge_checks_at(
    pool: &Pool<Sqlite>,
    user_id: i64,
    now: NaiveDateTime,
) -> Vec<NudgeDelivery> {
    let mut created = Vec::new();
    for code in ALL_RULES {
        let result = match code {
            RuleCode::SpendingSpike => rules::check_spending_spike(pool, user_id, now).await,
            RuleCode::BudgetOver => rules::check_budget_overspend(pool, user_id, now).await,
            RuleCode::LateNight => rules::check_late_night(pool, user_id, now).await,
            RuleCode::WeekendSpend => rules::check_weekend_spend(pool, user_id, now).await,
            RuleCode::RepeatCategory => rules::check_repeat_category(pool, user_id, now).await,
        };
        match result {
            Ok(Some(delivery)) => created.push(delivery),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(user_id, rule = code.as_str(), error = %e, "nudge check failed");
            }
        }
    }
    created
}
