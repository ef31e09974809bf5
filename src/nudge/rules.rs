use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{Pool, Sqlite};

use super::{deliver_nudge, should_skip_nudge, RuleCode, Severity};
use crate::database::db::queries;
use crate::database::models::NudgeDelivery;

/// Same-category expenses within the repeat window before a nudge fires.
const REPEAT_THRESHOLD: i64 = 3;

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (start, end)
}

// 1) Spending spike: today's total vs the rolling 7-day daily average.
pub async fn check_spending_spike(
    pool: &Pool<Sqlite>,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<Option<NudgeDelivery>, sqlx::Error> {
    if should_skip_nudge(pool, user_id, RuleCode::SpendingSpike, now).await? {
        return Ok(None);
    }

    let today = now.date();
    let by_day = queries::expense_day_totals(pool, user_id, today - Duration::days(6), today).await?;
    if by_day.len() < 2 {
        return Ok(None);
    }

    let today_total = by_day
        .iter()
        .find(|(date, _)| *date == today)
        .map(|(_, total)| *total)
        .unwrap_or(Decimal::ZERO);
    let sum: Decimal = by_day.iter().map(|(_, total)| *total).sum();
    let avg = sum / Decimal::from(by_day.len() as i64);

    if avg <= Decimal::ZERO || today_total <= avg * Decimal::new(15, 1) {
        return Ok(None);
    }

    let pct = ((today_total / avg - Decimal::ONE) * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let message = format!(
        "Today's spending is about {}% above your recent average. Small pause before the next purchase?",
        pct
    );
    deliver_nudge(pool, user_id, RuleCode::SpendingSpike, &message, Severity::Warning, now)
        .await
        .map(Some)
}

// 2) Budget over: a category exceeded its monthly limit. Largest overspend
// wins, ties broken by lowest category id.
pub async fn check_budget_overspend(
    pool: &Pool<Sqlite>,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<Option<NudgeDelivery>, sqlx::Error> {
    if should_skip_nudge(pool, user_id, RuleCode::BudgetOver, now).await? {
        return Ok(None);
    }

    let (month_start, month_end) = month_bounds(now.date());
    let statuses = queries::month_budget_status(pool, user_id, month_start, month_end).await?;

    let mut over: Vec<_> = statuses
        .iter()
        .filter(|s| s.spent > s.amount_limit)
        .collect();
    over.sort_by(|a, b| {
        (b.spent - b.amount_limit)
            .cmp(&(a.spent - a.amount_limit))
            .then(a.category_id.cmp(&b.category_id))
    });
    let Some(worst) = over.first() else {
        return Ok(None);
    };

    let message = format!(
        "You're over your {} budget by {:.2} this month. You can adjust the budget or ease off until next month.",
        worst.category_name,
        worst.spent - worst.amount_limit
    );
    deliver_nudge(pool, user_id, RuleCode::BudgetOver, &message, Severity::Warning, now)
        .await
        .map(Some)
}

// 3) Late night: an expense was logged (created_at, not the user-chosen
// date) within the last hour and after 22:00.
pub async fn check_late_night(
    pool: &Pool<Sqlite>,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<Option<NudgeDelivery>, sqlx::Error> {
    if should_skip_nudge(pool, user_id, RuleCode::LateNight, now).await? {
        return Ok(None);
    }

    let ten_pm = NaiveTime::from_hms_opt(22, 0, 0).expect("valid time");
    let recent = queries::expenses_created_since(pool, user_id, now - Duration::hours(1)).await?;
    if !recent.iter().any(|e| e.created_at.time() > ten_pm) {
        return Ok(None);
    }

    let message =
        "You just logged an expense late at night. Late-night spending can add up — consider a quick check tomorrow.";
    deliver_nudge(pool, user_id, RuleCode::LateNight, message, Severity::Info, now)
        .await
        .map(Some)
}

// 4) Weekend: weekend total vs weekday daily average over the last week.
// Only meaningful while the weekend is happening.
pub async fn check_weekend_spend(
    pool: &Pool<Sqlite>,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<Option<NudgeDelivery>, sqlx::Error> {
    if should_skip_nudge(pool, user_id, RuleCode::WeekendSpend, now).await? {
        return Ok(None);
    }
    if !matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return Ok(None);
    }

    let today = now.date();
    let by_day = queries::expense_day_totals(pool, user_id, today - Duration::days(6), today).await?;

    let (weekend_days, weekday_days): (Vec<_>, Vec<_>) = by_day
        .iter()
        .partition(|(date, _)| matches!(date.weekday(), Weekday::Sat | Weekday::Sun));

    let weekend_total: Decimal = weekend_days.iter().map(|(_, total)| *total).sum();
    let weekday_avg = if weekday_days.is_empty() {
        Decimal::ZERO
    } else {
        let weekday_sum: Decimal = weekday_days.iter().map(|(_, total)| *total).sum();
        weekday_sum / Decimal::from(weekday_days.len() as i64)
    };

    if weekday_avg <= Decimal::ZERO || weekend_total <= weekday_avg * Decimal::new(13, 1) {
        return Ok(None);
    }

    let message =
        "Weekend spending is a bit higher than your weekday average. Nothing wrong with that — just something to be aware of.";
    deliver_nudge(pool, user_id, RuleCode::WeekendSpend, message, Severity::Info, now)
        .await
        .map(Some)
}

// 5) Repeat category: the same category logged several times in a short
// window. Highest count wins, ties broken by lowest category id.
pub async fn check_repeat_category(
    pool: &Pool<Sqlite>,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<Option<NudgeDelivery>, sqlx::Error> {
    if should_skip_nudge(pool, user_id, RuleCode::RepeatCategory, now).await? {
        return Ok(None);
    }

    let counts = queries::category_counts_since(pool, user_id, now - Duration::hours(24)).await?;
    match counts.first() {
        Some((_, name, cnt)) if *cnt >= REPEAT_THRESHOLD => {
            let message = format!(
                "You've logged {} expenses in \"{}\" in the last 24 hours. Worth a quick pause?",
                cnt, name
            );
            deliver_nudge(pool, user_id, RuleCode::RepeatCategory, &message, Severity::Info, now)
                .await
                .map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::db::connection::test_pool;
    use crate::nudge::testutil::{d, dt, seed_budget, seed_category, seed_expense};

    // daily totals [10,10,10,10,10,10,50]: avg ~15.71, today 50 > 23.57
    #[tokio::test]
    async fn spike_fires_on_high_today() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "General").await;
        let now = dt(2026, 8, 5, 12, 0); // Wednesday

        for offset in 1..=6 {
            let date = now.date() - Duration::days(offset);
            seed_expense(&pool, 1, cat, "10", date, dt_on(date)).await;
        }
        seed_expense(&pool, 1, cat, "50", now.date(), now).await;

        let nudge = check_spending_spike(&pool, 1, now).await.unwrap().expect("fires");
        assert_eq!(nudge.rule_code, RuleCode::SpendingSpike);
        assert_eq!(nudge.severity, Severity::Warning);
        assert!(nudge.message.contains("218%"), "message: {}", nudge.message);
    }

    // daily totals [20,22,19,21,20,23,24]: today 24 < 21.3 * 1.5
    #[tokio::test]
    async fn spike_quiet_on_steady_week() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "General").await;
        let now = dt(2026, 8, 5, 12, 0);

        let totals = ["20", "22", "19", "21", "20", "23"];
        for (i, amount) in totals.iter().enumerate() {
            let date = now.date() - Duration::days(6 - i as i64);
            seed_expense(&pool, 1, cat, amount, date, dt_on(date)).await;
        }
        seed_expense(&pool, 1, cat, "24", now.date(), now).await;

        assert!(check_spending_spike(&pool, 1, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn spike_needs_two_days_of_data() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "General").await;
        let now = dt(2026, 8, 5, 12, 0);

        // one day only, however large
        seed_expense(&pool, 1, cat, "500", now.date(), now).await;
        assert!(check_spending_spike(&pool, 1, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn budget_over_reports_overage() {
        let pool = test_pool().await;
        let dining = seed_category(&pool, "Dining").await;
        let now = dt(2026, 8, 5, 12, 0);

        seed_budget(&pool, 1, dining, "2026-08", "200", now).await;
        seed_expense(&pool, 1, dining, "150", d(2026, 8, 2), dt(2026, 8, 2, 12, 0)).await;
        seed_expense(&pool, 1, dining, "100", d(2026, 8, 4), dt(2026, 8, 4, 12, 0)).await;

        let nudge = check_budget_overspend(&pool, 1, now).await.unwrap().expect("fires");
        assert_eq!(nudge.rule_code, RuleCode::BudgetOver);
        assert!(nudge.message.contains("Dining"), "message: {}", nudge.message);
        assert!(nudge.message.contains("50.00"), "message: {}", nudge.message);
    }

    #[tokio::test]
    async fn budget_under_limit_is_quiet() {
        let pool = test_pool().await;
        let dining = seed_category(&pool, "Dining").await;
        let now = dt(2026, 8, 5, 12, 0);

        seed_budget(&pool, 1, dining, "2026-08", "200", now).await;
        seed_expense(&pool, 1, dining, "199.99", d(2026, 8, 2), dt(2026, 8, 2, 12, 0)).await;

        assert!(check_budget_overspend(&pool, 1, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn budget_over_picks_largest_overspend() {
        let pool = test_pool().await;
        let dining = seed_category(&pool, "Dining").await;
        let games = seed_category(&pool, "Games").await;
        let now = dt(2026, 8, 5, 12, 0);

        // Dining over by 10, Games over by 75: Games wins
        seed_budget(&pool, 1, dining, "2026-08", "100", now).await;
        seed_budget(&pool, 1, games, "2026-08", "25", now).await;
        seed_expense(&pool, 1, dining, "110", d(2026, 8, 3), dt(2026, 8, 3, 12, 0)).await;
        seed_expense(&pool, 1, games, "100", d(2026, 8, 3), dt(2026, 8, 3, 13, 0)).await;

        let nudge = check_budget_overspend(&pool, 1, now).await.unwrap().expect("fires");
        assert!(nudge.message.contains("Games"), "message: {}", nudge.message);
        assert!(nudge.message.contains("75.00"), "message: {}", nudge.message);
    }

    #[tokio::test]
    async fn late_night_fires_on_fresh_late_expense() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "Snacks").await;
        let now = dt(2026, 8, 5, 23, 30);

        seed_expense(&pool, 1, cat, "12", d(2026, 8, 5), dt(2026, 8, 5, 23, 5)).await;

        let nudge = check_late_night(&pool, 1, now).await.unwrap().expect("fires");
        assert_eq!(nudge.rule_code, RuleCode::LateNight);
        assert_eq!(nudge.severity, Severity::Info);
    }

    #[tokio::test]
    async fn late_night_ignores_old_or_daytime_expenses() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "Snacks").await;

        // logged at 23:05 but checked two hours later: outside the window
        seed_expense(&pool, 1, cat, "12", d(2026, 8, 5), dt(2026, 8, 5, 23, 5)).await;
        assert!(check_late_night(&pool, 1, dt(2026, 8, 6, 1, 10)).await.unwrap().is_none());

        // logged within the hour but during the day
        seed_expense(&pool, 2, cat, "12", d(2026, 8, 5), dt(2026, 8, 5, 14, 30)).await;
        assert!(check_late_night(&pool, 2, dt(2026, 8, 5, 15, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn weekend_fires_only_on_weekend() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "Fun").await;
        let saturday = dt(2026, 8, 8, 18, 0);

        // Mon-Fri avg 10, Saturday 100
        for offset in 1..=5 {
            let date = saturday.date() - Duration::days(offset);
            seed_expense(&pool, 1, cat, "10", date, dt_on(date)).await;
        }
        seed_expense(&pool, 1, cat, "100", saturday.date(), saturday).await;

        let nudge = check_weekend_spend(&pool, 1, saturday).await.unwrap().expect("fires");
        assert_eq!(nudge.rule_code, RuleCode::WeekendSpend);

        // same data evaluated on a weekday: rule does not apply
        let pool2 = test_pool().await;
        let cat2 = seed_category(&pool2, "Fun").await;
        let wednesday = dt(2026, 8, 5, 18, 0);
        for offset in 1..=5 {
            let date = wednesday.date() - Duration::days(offset);
            seed_expense(&pool2, 1, cat2, "10", date, dt_on(date)).await;
        }
        assert!(check_weekend_spend(&pool2, 1, wednesday).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn weekend_quiet_without_weekday_baseline() {
        let pool = test_pool().await;
        let cat = seed_category(&pool, "Fun").await;
        let saturday = dt(2026, 8, 8, 18, 0);

        // weekend-only data: weekday_avg is 0, no signal
        seed_expense(&pool, 1, cat, "100", saturday.date(), saturday).await;
        assert!(check_weekend_spend(&pool, 1, saturday).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeat_category_counts_last_24h() {
        let pool = test_pool().await;
        let coffee = seed_category(&pool, "Coffee").await;
        let lunch = seed_category(&pool, "Lunch").await;
        let now = dt(2026, 8, 5, 16, 0);

        for hour in [9, 11, 14] {
            seed_expense(&pool, 1, coffee, "4.50", d(2026, 8, 5), dt(2026, 8, 5, hour, 0)).await;
        }
        seed_expense(&pool, 1, lunch, "15", d(2026, 8, 5), dt(2026, 8, 5, 12, 0)).await;

        let nudge = check_repeat_category(&pool, 1, now).await.unwrap().expect("fires");
        assert!(nudge.message.contains('3'), "message: {}", nudge.message);
        assert!(nudge.message.contains("Coffee"), "message: {}", nudge.message);
    }

    #[tokio::test]
    async fn repeat_category_ignores_counts_below_threshold() {
        let pool = test_pool().await;
        let coffee = seed_category(&pool, "Coffee").await;
        let now = dt(2026, 8, 5, 16, 0);

        seed_expense(&pool, 1, coffee, "4.50", d(2026, 8, 5), dt(2026, 8, 5, 9, 0)).await;
        seed_expense(&pool, 1, coffee, "4.50", d(2026, 8, 5), dt(2026, 8, 5, 11, 0)).await;
        // third one is older than 24h
        seed_expense(&pool, 1, coffee, "4.50", d(2026, 8, 3), dt(2026, 8, 3, 9, 0)).await;

        assert!(check_repeat_category(&pool, 1, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeat_category_tie_breaks_on_lowest_id() {
        let pool = test_pool().await;
        let coffee = seed_category(&pool, "Coffee").await; // lower id
        let snacks = seed_category(&pool, "Snacks").await;
        let now = dt(2026, 8, 5, 16, 0);

        for hour in [9, 11, 14] {
            seed_expense(&pool, 1, coffee, "4", d(2026, 8, 5), dt(2026, 8, 5, hour, 0)).await;
            seed_expense(&pool, 1, snacks, "2", d(2026, 8, 5), dt(2026, 8, 5, hour, 30)).await;
        }

        let nudge = check_repeat_category(&pool, 1, now).await.unwrap().expect("fires");
        assert!(nudge.message.contains("Coffee"), "message: {}", nudge.message);
    }

    fn dt_on(date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(12, 0, 0).expect("valid time")
    }
}
