use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::{Pool, Sqlite};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::database::models::{
    Budget, Category, Expense, NudgeDelivery, NudgePreference, PushSubscription,
};
use crate::nudge::{RuleCode, Severity};

/*
All SQL lives here. Monetary columns are TEXT decimal strings; they are
parsed with Decimal::from_str on read and summed in Rust, never with SQL
SUM over TEXT.
 */

fn decode_amount(text: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(text)
        .map_err(|e| sqlx::Error::Decode(format!("Invalid Decimal format for amount: {}", e).into()))
}

/*==========Category Queries===========*/

// Create category
pub async fn create_category(pool: &Pool<Sqlite>, name: &str) -> Result<Category, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO categories (name)
        VALUES (?)
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

// Get all categories
pub async fn get_all_categories(pool: &Pool<Sqlite>) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name ASC")
        .fetch_all(pool)
        .await
}

/*==========Expense Queries===========*/

fn expense_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Expense, sqlx::Error> {
    let amount_text: String = row.try_get("amount")?;
    Ok(Expense {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        category_id: row.try_get("category_id")?,
        amount: decode_amount(&amount_text)?,
        description: row.try_get("description")?,
        expense_date: row.try_get("expense_date")?,
        created_at: row.try_get("created_at")?,
    })
}

// Create expense. created_at is passed in so the caller owns the clock.
pub async fn create_expense(
    pool: &Pool<Sqlite>,
    user_id: i64,
    category_id: i64,
    amount: Decimal,
    description: Option<&str>,
    expense_date: NaiveDate,
    created_at: NaiveDateTime,
) -> Result<Expense, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO expenses (user_id, category_id, amount, description, expense_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(category_id)
    .bind(amount.to_string())
    .bind(description)
    .bind(expense_date)
    .bind(created_at)
    .fetch_one(pool)
    .await?;

    Ok(Expense {
        id,
        user_id,
        category_id,
        amount,
        description: description.map(|s| s.to_string()),
        expense_date,
        created_at,
    })
}

// List expenses with optional date/category filters
pub async fn get_expenses(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
    category_id: Option<i64>,
) -> Result<Vec<Expense>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, category_id, amount, description, expense_date, created_at
        FROM expenses
        WHERE user_id = ?1
          AND (?2 IS NULL OR expense_date >= ?2)
          AND (?3 IS NULL OR expense_date <= ?3)
          AND (?4 IS NULL OR category_id = ?4)
        ORDER BY expense_date DESC, created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(from_date)
    .bind(to_date)
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(expense_from_row).collect()
}

// Per-day expense totals over an inclusive date range. Days without
// expenses are absent from the result.
pub async fn expense_day_totals(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> Result<Vec<(NaiveDate, Decimal)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT expense_date, amount
        FROM expenses
        WHERE user_id = ? AND expense_date >= ? AND expense_date <= ?
        "#,
    )
    .bind(user_id)
    .bind(from_date)
    .bind(to_date)
    .fetch_all(pool)
    .await?;

    let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for row in rows {
        let date: NaiveDate = row.try_get("expense_date")?;
        let amount_text: String = row.try_get("amount")?;
        *by_day.entry(date).or_insert(Decimal::ZERO) += decode_amount(&amount_text)?;
    }
    Ok(by_day.into_iter().collect())
}

// Expenses whose creation timestamp falls after `since`
pub async fn expenses_created_since(
    pool: &Pool<Sqlite>,
    user_id: i64,
    since: NaiveDateTime,
) -> Result<Vec<Expense>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, category_id, amount, description, expense_date, created_at
        FROM expenses
        WHERE user_id = ? AND created_at > ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.iter().map(expense_from_row).collect()
}

// Expense counts per category since a timestamp, largest count first,
// ties broken by lowest category id.
pub async fn category_counts_since(
    pool: &Pool<Sqlite>,
    user_id: i64,
    since: NaiveDateTime,
) -> Result<Vec<(i64, String, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT e.category_id, c.name, COUNT(*) AS cnt
        FROM expenses e
        JOIN categories c ON c.id = e.category_id
        WHERE e.user_id = ? AND e.created_at > ?
        GROUP BY e.category_id, c.name
        ORDER BY cnt DESC, e.category_id ASC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok((
                row.try_get("category_id")?,
                row.try_get("name")?,
                row.try_get("cnt")?,
            ))
        })
        .collect()
}

/*==========Budget Queries===========*/

// Create or replace the budget for (user, category, month)
pub async fn upsert_budget(
    pool: &Pool<Sqlite>,
    user_id: i64,
    category_id: i64,
    year_month: &str,
    amount_limit: Decimal,
    now: NaiveDateTime,
) -> Result<Budget, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO budgets (user_id, category_id, year_month, amount_limit, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (user_id, category_id, year_month)
        DO UPDATE SET amount_limit = excluded.amount_limit
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(category_id)
    .bind(year_month)
    .bind(amount_limit.to_string())
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(Budget {
        id,
        user_id,
        category_id,
        year_month: year_month.to_string(),
        amount_limit,
        created_at: now,
    })
}

pub async fn get_budgets(
    pool: &Pool<Sqlite>,
    user_id: i64,
    year_month: Option<&str>,
) -> Result<Vec<Budget>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, category_id, year_month, amount_limit, created_at
        FROM budgets
        WHERE user_id = ?1 AND (?2 IS NULL OR year_month = ?2)
        ORDER BY year_month DESC, category_id ASC
        "#,
    )
    .bind(user_id)
    .bind(year_month)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let limit_text: String = row.try_get("amount_limit")?;
            Ok(Budget {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                category_id: row.try_get("category_id")?,
                year_month: row.try_get("year_month")?,
                amount_limit: decode_amount(&limit_text)?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Spent-vs-limit for one budgeted category in one month.
#[derive(Debug, Clone)]
pub struct BudgetStatus {
    pub category_id: i64,
    pub category_name: String,
    pub amount_limit: Decimal,
    pub spent: Decimal,
}

// Budget limits joined with cumulative spend for the month starting at
// `month_start` (spend counted by expense_date; month_end exclusive).
pub async fn month_budget_status(
    pool: &Pool<Sqlite>,
    user_id: i64,
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> Result<Vec<BudgetStatus>, sqlx::Error> {
    let year_month = month_start.format("%Y-%m").to_string();

    let budget_rows = sqlx::query(
        r#"
        SELECT b.category_id, c.name, b.amount_limit
        FROM budgets b
        JOIN categories c ON c.id = b.category_id
        WHERE b.user_id = ? AND b.year_month = ?
        ORDER BY b.category_id ASC
        "#,
    )
    .bind(user_id)
    .bind(&year_month)
    .fetch_all(pool)
    .await?;

    if budget_rows.is_empty() {
        return Ok(Vec::new());
    }

    let expense_rows = sqlx::query(
        r#"
        SELECT category_id, amount
        FROM expenses
        WHERE user_id = ? AND expense_date >= ? AND expense_date < ?
        "#,
    )
    .bind(user_id)
    .bind(month_start)
    .bind(month_end)
    .fetch_all(pool)
    .await?;

    let mut spent_by_category: BTreeMap<i64, Decimal> = BTreeMap::new();
    for row in expense_rows {
        let category_id: i64 = row.try_get("category_id")?;
        let amount_text: String = row.try_get("amount")?;
        *spent_by_category.entry(category_id).or_insert(Decimal::ZERO) +=
            decode_amount(&amount_text)?;
    }

    budget_rows
        .iter()
        .map(|row| {
            let category_id: i64 = row.try_get("category_id")?;
            let limit_text: String = row.try_get("amount_limit")?;
            Ok(BudgetStatus {
                category_id,
                category_name: row.try_get("name")?,
                amount_limit: decode_amount(&limit_text)?,
                spent: spent_by_category
                    .get(&category_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO),
            })
        })
        .collect()
}

/*==========Nudge Delivery Queries===========*/

// Append to the delivery log
pub async fn insert_delivery(
    pool: &Pool<Sqlite>,
    user_id: i64,
    rule_code: RuleCode,
    message: &str,
    severity: Severity,
    now: NaiveDateTime,
) -> Result<NudgeDelivery, sqlx::Error> {
    sqlx::query_as::<_, NudgeDelivery>(
        r#"
        INSERT INTO nudge_deliveries (user_id, rule_code, message, severity, shown_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, user_id, rule_code, message, severity, shown_at,
                  dismissed_at, muted_until, created_at
        "#,
    )
    .bind(user_id)
    .bind(rule_code)
    .bind(message)
    .bind(severity)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

// Any delivery of this rule shown after `since`? Dismissal does not matter:
// cooldown is measured from shown_at.
pub async fn has_delivery_since(
    pool: &Pool<Sqlite>,
    user_id: i64,
    rule_code: RuleCode,
    since: NaiveDateTime,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT 1 AS one FROM nudge_deliveries
        WHERE user_id = ? AND rule_code = ? AND shown_at > ?
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(rule_code)
    .bind(since)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

// Undismissed nudges, most recent first
pub async fn list_active_nudges(
    pool: &Pool<Sqlite>,
    user_id: i64,
    limit: i64,
) -> Result<Vec<NudgeDelivery>, sqlx::Error> {
    sqlx::query_as::<_, NudgeDelivery>(
        r#"
        SELECT id, user_id, rule_code, message, severity, shown_at,
               dismissed_at, muted_until, created_at
        FROM nudge_deliveries
        WHERE user_id = ? AND dismissed_at IS NULL
        ORDER BY shown_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

// Mark a nudge dismissed. Returns false when no such delivery exists for
// this user.
pub async fn dismiss_nudge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    delivery_id: i64,
    now: NaiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE nudge_deliveries SET dismissed_at = ?
        WHERE user_id = ? AND id = ? AND dismissed_at IS NULL
        "#,
    )
    .bind(now)
    .bind(user_id)
    .bind(delivery_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/*==========Nudge Preference Queries===========*/

pub async fn get_preference(
    pool: &Pool<Sqlite>,
    user_id: i64,
    rule_code: RuleCode,
) -> Result<Option<NudgePreference>, sqlx::Error> {
    sqlx::query_as::<_, NudgePreference>(
        r#"
        SELECT id, user_id, rule_code, muted_until, disabled, updated_at
        FROM nudge_preferences
        WHERE user_id = ? AND rule_code = ?
        "#,
    )
    .bind(user_id)
    .bind(rule_code)
    .fetch_optional(pool)
    .await
}

pub async fn get_preferences(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<NudgePreference>, sqlx::Error> {
    sqlx::query_as::<_, NudgePreference>(
        r#"
        SELECT id, user_id, rule_code, muted_until, disabled, updated_at
        FROM nudge_preferences
        WHERE user_id = ?
        ORDER BY rule_code ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

// Upsert with per-field presence semantics: a field left as None in the
// call keeps its stored value; Some(None) for muted_until is an explicit
// unmute. New rows default to muted_until NULL / disabled false.
pub async fn upsert_preference(
    pool: &Pool<Sqlite>,
    user_id: i64,
    rule_code: RuleCode,
    muted_until: Option<Option<NaiveDateTime>>,
    disabled: Option<bool>,
    now: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO nudge_preferences (user_id, rule_code, muted_until, disabled, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (user_id, rule_code) DO UPDATE SET
            muted_until = CASE WHEN ?6 THEN excluded.muted_until
                               ELSE nudge_preferences.muted_until END,
            disabled    = CASE WHEN ?7 THEN excluded.disabled
                               ELSE nudge_preferences.disabled END,
            updated_at  = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(rule_code)
    .bind(muted_until.flatten())
    .bind(disabled.unwrap_or(false))
    .bind(now)
    .bind(muted_until.is_some())
    .bind(disabled.is_some())
    .execute(pool)
    .await?;
    Ok(())
}

/*==========Push Subscription Queries===========*/

pub async fn upsert_subscription(
    pool: &Pool<Sqlite>,
    user_id: i64,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
    now: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (user_id, endpoint)
        DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth
        "#,
    )
    .bind(user_id)
    .bind(endpoint)
    .bind(p256dh)
    .bind(auth)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_subscription(
    pool: &Pool<Sqlite>,
    user_id: i64,
    endpoint: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = ? AND endpoint = ?")
        .bind(user_id)
        .bind(endpoint)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_subscriptions(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<PushSubscription>, sqlx::Error> {
    sqlx::query_as::<_, PushSubscription>(
        r#"
        SELECT id, user_id, endpoint, p256dh, auth, created_at
        FROM push_subscriptions
        WHERE user_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
