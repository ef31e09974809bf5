//! Rule-based nudge engine. No ML; explainable threshold heuristics only.
//! Rules read recent ledger history, pass through a cooldown/mute gate,
//! and surviving candidates are persisted to the delivery log.

use serde::{Deserialize, Serialize};

pub mod deliver;
pub mod engine;
pub mod gate;
pub mod rules;
#[cfg(test)]
pub(crate) mod testutil;

pub use deliver::deliver_nudge;
pub use engine::{run_nudge_checks, run_nudge_checks_at};
pub use gate::should_skip_nudge;

/// Stable identifier for one heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RuleCode {
    SpendingSpike,
    BudgetOver,
    LateNight,
    WeekendSpend,
    RepeatCategory,
}

/// Fixed evaluation order; also the coordinator's output order.
pub const ALL_RULES: [RuleCode; 5] = [
    RuleCode::SpendingSpike,
    RuleCode::BudgetOver,
    RuleCode::LateNight,
    RuleCode::WeekendSpend,
    RuleCode::RepeatCategory,
];

impl RuleCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCode::SpendingSpike => "spending_spike",
            RuleCode::BudgetOver => "budget_over",
            RuleCode::LateNight => "late_night",
            RuleCode::WeekendSpend => "weekend_spend",
            RuleCode::RepeatCategory => "repeat_category",
        }
    }

    /// Parse an API-supplied code. Unknown codes get `None` so they can be
    /// rejected at the boundary instead of reaching storage.
    pub fn parse(s: &str) -> Option<RuleCode> {
        match s {
            "spending_spike" => Some(RuleCode::SpendingSpike),
            "budget_over" => Some(RuleCode::BudgetOver),
            "late_night" => Some(RuleCode::LateNight),
            "weekend_spend" => Some(RuleCode::WeekendSpend),
            "repeat_category" => Some(RuleCode::RepeatCategory),
            _ => None,
        }
    }

    /// Minimum hours between two deliveries of this rule to the same user.
    pub fn cooldown_hours(&self) -> i64 {
        match self {
            RuleCode::SpendingSpike => 24,
            RuleCode::BudgetOver => 12,
            RuleCode::LateNight => 24,
            RuleCode::WeekendSpend => 48,
            RuleCode::RepeatCategory => 24,
        }
    }
}

/// Coarse priority tag. `warning` and `high` also attempt push dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    High,
}

impl Severity {
    pub fn wants_push(&self) -> bool {
        matches!(self, Severity::Warning | Severity::High)
    }
}
