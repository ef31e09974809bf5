//! Seed helpers shared by the nudge tests.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use crate::database::db::queries;

pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    d(year, month, day).and_hms_opt(hour, minute, 0).expect("valid time")
}

pub async fn seed_category(pool: &Pool<Sqlite>, name: &str) -> i64 {
    queries::create_category(pool, name).await.expect("category").id
}

pub async fn seed_expense(
    pool: &Pool<Sqlite>,
    user_id: i64,
    category_id: i64,
    amount: &str,
    expense_date: NaiveDate,
    created_at: NaiveDateTime,
) -> i64 {
    queries::create_expense(
        pool,
        user_id,
        category_id,
        Decimal::from_str(amount).expect("amount"),
        None,
        expense_date,
        created_at,
    )
    .await
    .expect("expense")
    .id
}

pub async fn seed_budget(
    pool: &Pool<Sqlite>,
    user_id: i64,
    category_id: i64,
    year_month: &str,
    amount_limit: &str,
    now: NaiveDateTime,
) -> i64 {
    queries::upsert_budget(
        pool,
        user_id,
        category_id,
        year_month,
        Decimal::from_str(amount_limit).expect("limit"),
        now,
    )
    .await
    .expect("budget")
    .id
}

/// A week of steady 10s with a 50 today: qualifies for spending_spike and
/// nothing else.
pub async fn seed_spike_week(pool: &Pool<Sqlite>, user_id: i64, now: NaiveDateTime) {
    let cat = seed_category(pool, "General").await;
    for offset in 1..=6 {
        let date = now.date() - Duration::days(offset);
        let logged = date.and_hms_opt(12, 0, 0).expect("valid time");
        seed_expense(pool, user_id, cat, "10", date, logged).await;
    }
    seed_expense(pool, user_id, cat, "50", now.date(), now).await;
}
