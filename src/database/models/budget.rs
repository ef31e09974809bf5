use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub year_month: String, // "YYYY-MM"
    pub amount_limit: Decimal,
    pub created_at: NaiveDateTime,
}
