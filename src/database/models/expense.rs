use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Not FromRow: amount is TEXT in SQLite and parsed to Decimal by hand
// in the query layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
    pub expense_date: NaiveDate,    // user-chosen date
    pub created_at: NaiveDateTime,  // when the row was logged
}
