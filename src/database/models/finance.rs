use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinanceTransaction {
    pub id: Uuid,
    pub church_id: Uuid,
    pub branch_id: Uuid,
    pub kind: String,
    /// tithe, offering, donation, pledge, salary, utilities, ...
    pub category: String,
    pub amount: Decimal,
    pub currency: String,
    pub member_id: Option<Uuid>,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub recorded_by: Uuid,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the totals grouped by kind and category
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryTotal {
    pub kind: String,
    pub category: String,
    pub total: Decimal,
    pub count: i64,
}
