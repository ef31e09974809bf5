use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::backend::AppState;
use crate::database::db::queries;
use crate::nudge::{self, RuleCode};

// Single-user deployment: user_id = 1 (extension point for real auth).
const USER_ID: i64 = 1;

const ACTIVE_NUDGE_LIMIT: i64 = 20;

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn db_error(err: sqlx::Error) -> Response {
    tracing::error!(error = %err, "database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error" })),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/*==========Categories===========*/

#[derive(Debug, Deserialize)]
pub struct CreateCategory {
    pub name: String,
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategory>,
) -> Response {
    if payload.name.trim().is_empty() {
        return bad_request("name is required");
    }
    match queries::create_category(&state.db, payload.name.trim()).await {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => db_error(e),
    }
}

pub async fn list_categories(State(state): State<AppState>) -> Response {
    match queries::get_all_categories(&state.db).await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => db_error(e),
    }
}

/*==========Expenses===========*/

#[derive(Debug, Deserialize)]
pub struct CreateExpense {
    pub amount: Decimal,
    pub category_id: i64,
    pub description: Option<String>,
    pub expense_date: Option<NaiveDate>,
}

// Creating an expense also runs the nudge checks right away, so rules tied
// to the moment of logging (late_night) see a fresh window. New nudges ride
// along in the response.
pub async fn create_expense(
    State(state): State<AppState>,
    Json(payload): Json<CreateExpense>,
) -> Response {
    let created_at = now();
    let expense_date = payload.expense_date.unwrap_or_else(|| created_at.date());

    let expense = match queries::create_expense(
        &state.db,
        USER_ID,
        payload.category_id,
        payload.amount,
        payload.description.as_deref(),
        expense_date,
        created_at,
    )
    .await
    {
        Ok(expense) => expense,
        Err(e) => return db_error(e),
    };

    let nudges = nudge::run_nudge_checks(&state.db, USER_ID).await;
    (StatusCode::CREATED, Json(json!({ "expense": expense, "nudges": nudges }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ExpenseFilter {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub category_id: Option<i64>,
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Query(filter): Query<ExpenseFilter>,
) -> Response {
    match queries::get_expenses(
        &state.db,
        USER_ID,
        filter.from_date,
        filter.to_date,
        filter.category_id,
    )
    .await
    {
        Ok(expenses) => Json(expenses).into_response(),
        Err(e) => db_error(e),
    }
}

/*==========Budgets===========*/

#[derive(Debug, Deserialize)]
pub struct CreateBudget {
    pub category_id: i64,
    pub year_month: String,
    pub amount_limit: Decimal,
}

pub async fn create_budget(
    State(state): State<AppState>,
    Json(payload): Json<CreateBudget>,
) -> Response {
    // "YYYY-MM"
    let first_day = format!("{}-01", payload.year_month);
    if NaiveDate::parse_from_str(&first_day, "%Y-%m-%d").is_err() {
        return bad_request("year_month must be YYYY-MM");
    }

    match queries::upsert_budget(
        &state.db,
        USER_ID,
        payload.category_id,
        &payload.year_month,
        payload.amount_limit,
        now(),
    )
    .await
    {
        Ok(budget) => (StatusCode::CREATED, Json(budget)).into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct BudgetFilter {
    pub year_month: Option<String>,
}

pub async fn list_budgets(
    State(state): State<AppState>,
    Query(filter): Query<BudgetFilter>,
) -> Response {
    match queries::get_budgets(&state.db, USER_ID, filter.year_month.as_deref()).await {
        Ok(budgets) => Json(budgets).into_response(),
        Err(e) => db_error(e),
    }
}

/*==========Nudges===========*/

#[derive(Debug, Deserialize)]
pub struct NudgeListParams {
    pub check: Option<String>,
}

// GET /api/nudges?check=1 runs the engine first; the response is always
// the current active list.
pub async fn list_nudges(
    State(state): State<AppState>,
    Query(params): Query<NudgeListParams>,
) -> Response {
    if params.check.as_deref() == Some("1") {
        nudge::run_nudge_checks(&state.db, USER_ID).await;
    }
    match queries::list_active_nudges(&state.db, USER_ID, ACTIVE_NUDGE_LIMIT).await {
        Ok(nudges) => Json(json!({ "nudges": nudges })).into_response(),
        Err(e) => db_error(e),
    }
}

pub async fn dismiss_nudge(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match queries::dismiss_nudge(&state.db, USER_ID, id, now()).await {
        Ok(true) => Json(json!({ "ok": true })).into_response(),
        Ok(false) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Nudge not found" }))).into_response()
        }
        Err(e) => db_error(e),
    }
}

pub async fn get_preferences(State(state): State<AppState>) -> Response {
    match queries::get_preferences(&state.db, USER_ID).await {
        Ok(preferences) => Json(json!({ "preferences": preferences })).into_response(),
        Err(e) => db_error(e),
    }
}

// Distinguishes an absent muted_until (leave unchanged) from an explicit
// null (unmute now).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub muted_until: Option<Option<NaiveDateTime>>,
    pub disabled: Option<bool>,
}

pub async fn set_preference(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<PreferenceUpdate>,
) -> Response {
    let Some(rule_code) = RuleCode::parse(&code) else {
        return bad_request("unknown rule code");
    };

    match queries::upsert_preference(
        &state.db,
        USER_ID,
        rule_code,
        payload.muted_until,
        payload.disabled,
        now(),
    )
    .await
    {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => db_error(e),
    }
}

/*==========Push Subscriptions===========*/

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub subscription: SubscriptionPayload,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionPayload {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeBody>,
) -> Response {
    let sub = payload.subscription;
    if sub.endpoint.is_empty() {
        return bad_request("subscription endpoint is required");
    }
    match queries::upsert_subscription(
        &state.db,
        USER_ID,
        &sub.endpoint,
        &sub.keys.p256dh,
        &sub.keys.auth,
        now(),
    )
    .await
    {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => db_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeBody {
    pub endpoint: String,
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(payload): Json<UnsubscribeBody>,
) -> Response {
    if payload.endpoint.is_empty() {
        return bad_request("endpoint is required");
    }
    match queries::remove_subscription(&state.db, USER_ID, &payload.endpoint).await {
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        Err(e) => db_error(e),
    }
}
