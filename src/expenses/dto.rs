use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use super::repo_types::{iso_date, ExpenseType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: ExpenseType,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: String,
    #[serde(with = "iso_date")]
    pub date: Date,
}
