use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{audit, ensure_branch, ensure_church_user, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::{Scope, Viewer};
use crate::auth::Role;
use crate::database::models::finance::{CategoryTotal, TransactionKind};
use crate::database::models::FinanceTransaction;
use crate::database::Repository;
use crate::filter::FilterData;
use crate::types::{double_option, DateWindow, ListQuery, Page};

const FINANCE_COLUMNS: &str = "id, church_id, branch_id, kind, category, amount, currency, member_id, description, \
     transaction_date, recorded_by, is_deleted, created_at, updated_at";

pub const FINANCE_READERS: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor];
pub const FINANCE_WRITERS: [Role; 3] = [Role::Superadmin, Role::Admin, Role::Pastor];

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FinanceFilter {
    pub kind: Option<TransactionKind>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransaction {
    pub church_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub member_id: Option<Uuid>,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTransaction {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub member_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub transaction_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinanceSummary {
    pub church_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    pub by_category: Vec<CategoryTotal>,
}

impl FinanceSummary {
    fn from_totals(scope: Scope, from: NaiveDate, to: NaiveDate, by_category: Vec<CategoryTotal>) -> Self {
        let sum = |kind: TransactionKind| -> Decimal {
            by_category
                .iter()
                .filter(|row| row.kind == kind.as_str())
                .map(|row| row.total)
                .sum()
        };
        let income = sum(TransactionKind::Income);
        let expense = sum(TransactionKind::Expense);
        Self {
            church_id: scope.church_id,
            branch_id: scope.branch_id,
            from,
            to,
            income,
            expense,
            net: income - expense,
            by_category,
        }
    }
}

/// Largest value the NUMERIC(14, 2) amount column holds
fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

fn check_amount(errors: &mut FieldErrors, amount: Decimal) {
    if amount <= Decimal::ZERO {
        errors.add("amount", "Amount must be greater than zero");
    } else if amount.normalize().scale() > 2 {
        errors.add("amount", "Amount cannot have more than two decimal places");
    } else if amount > max_amount() {
        errors.add("amount", format!("Amount cannot exceed {}", max_amount()));
    }
}

fn normalize_currency(errors: &mut FieldErrors, currency: &str) -> String {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        errors.add("currency", "Currency must be a three-letter ISO code");
    }
    code
}

pub struct FinanceService {
    pool: PgPool,
}

impl FinanceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<FinanceTransaction> {
        Repository::new("finance_transactions", self.pool.clone())
    }

    pub async fn list(
        &self,
        viewer: &Viewer,
        query: &ListQuery,
        window: &DateWindow,
        filter: &FinanceFilter,
    ) -> Result<Page<FinanceTransaction>, ServiceError> {
        viewer.require(&FINANCE_READERS)?;
        if !window.is_ordered() {
            return Err(ServiceError::invalid("from", "from must not be after to"));
        }
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?;

        let mut clause = scope.where_clause();
        let mut dates = Map::new();
        if let Some(from) = window.from {
            dates.insert("$gte".to_string(), json!(from));
        }
        if let Some(to) = window.to {
            dates.insert("$lte".to_string(), json!(to));
        }
        if !dates.is_empty() {
            clause.insert("transaction_date".to_string(), Value::Object(dates));
        }
        if let Some(kind) = filter.kind {
            clause.insert("kind".to_string(), json!(kind.as_str()));
        }
        if let Some(pattern) = query.search_pattern() {
            clause.insert("$or".to_string(), search_clause(&pattern, &["category", "description"]));
        }

        Ok(self
            .repository()
            .page(
                list_filter(clause, "transaction_date desc, created_at desc"),
                query.page(),
                query.limit(),
            )
            .await?)
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<FinanceTransaction, ServiceError> {
        viewer.require(&FINANCE_READERS)?;
        let transaction = self
            .repository()
            .select_one(FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Transaction not found"))?;
        viewer.ensure_readable("Transaction", transaction.church_id)?;
        Ok(transaction)
    }

    async fn get_writable(&self, viewer: &Viewer, id: Uuid) -> Result<FinanceTransaction, ServiceError> {
        viewer.require(&FINANCE_WRITERS)?;
        let transaction = self.get(viewer, id).await?;
        viewer.ensure_writable("Transaction", transaction.church_id, Some(transaction.branch_id))?;
        Ok(transaction)
    }

    pub async fn create(&self, viewer: &Viewer, input: CreateTransaction) -> Result<FinanceTransaction, ServiceError> {
        viewer.require(&FINANCE_WRITERS)?;
        let scope = Scope::resolve(viewer, input.church_id, Some(input.branch_id))?;
        viewer.ensure_writable("Branch", scope.church_id, scope.branch_id)?;

        let mut errors = FieldErrors::new();
        errors.require_text("category", &input.category);
        check_amount(&mut errors, input.amount);
        let currency = normalize_currency(&mut errors, input.currency.as_deref().unwrap_or("USD"));
        errors.into_result()?;

        ensure_branch(&self.pool, scope.church_id, input.branch_id).await?;
        if let Some(member_id) = input.member_id {
            ensure_church_user(&self.pool, scope.church_id, member_id, "member_id").await?;
        }

        let transaction: FinanceTransaction = sqlx::query_as(&format!(
            "INSERT INTO finance_transactions (id, church_id, branch_id, kind, category, amount, currency, \
             member_id, description, transaction_date, recorded_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            FINANCE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(input.branch_id)
        .bind(input.kind.as_str())
        .bind(input.category.trim().to_lowercase())
        .bind(input.amount)
        .bind(&currency)
        .bind(input.member_id)
        .bind(non_blank(input.description))
        .bind(input.transaction_date)
        .bind(viewer.id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Recorded {} {} {} in branch {}",
            transaction.kind,
            transaction.amount,
            transaction.currency,
            transaction.branch_id
        );
        Ok(transaction)
    }

    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdateTransaction) -> Result<FinanceTransaction, ServiceError> {
        let mut transaction = self.get_writable(viewer, id).await?;

        let mut errors = FieldErrors::new();
        if let Some(kind) = patch.kind {
            transaction.kind = kind.as_str().to_string();
        }
        if let Some(category) = patch.category {
            errors.require_text("category", &category);
            transaction.category = category.trim().to_lowercase();
        }
        if let Some(amount) = patch.amount {
            check_amount(&mut errors, amount);
            transaction.amount = amount;
        }
        if let Some(currency) = patch.currency {
            transaction.currency = normalize_currency(&mut errors, &currency);
        }
        if let Some(description) = patch.description {
            transaction.description = non_blank(description);
        }
        if let Some(date) = patch.transaction_date {
            transaction.transaction_date = date;
        }
        errors.into_result()?;

        if let Some(member_id) = patch.member_id {
            if let Some(member_id) = member_id {
                ensure_church_user(&self.pool, transaction.church_id, member_id, "member_id").await?;
            }
            transaction.member_id = member_id;
        }

        let transaction: FinanceTransaction = sqlx::query_as(&format!(
            "UPDATE finance_transactions SET kind = $2, category = $3, amount = $4, currency = $5, member_id = $6, \
             description = $7, transaction_date = $8, updated_at = now() WHERE id = $1 RETURNING {}",
            FINANCE_COLUMNS
        ))
        .bind(id)
        .bind(&transaction.kind)
        .bind(&transaction.category)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.member_id)
        .bind(&transaction.description)
        .bind(transaction.transaction_date)
        .fetch_one(&self.pool)
        .await?;
        audit(viewer, "update", "finance_transaction", transaction.id);
        Ok(transaction)
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<FinanceTransaction, ServiceError> {
        let transaction = self.get_writable(viewer, id).await?;
        let transaction: FinanceTransaction = sqlx::query_as(&format!(
            "UPDATE finance_transactions SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            FINANCE_COLUMNS
        ))
        .bind(transaction.id)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!("Transaction {} deleted by {}", transaction.id, viewer.id);
        audit(viewer, "delete", "finance_transaction", transaction.id);
        Ok(transaction)
    }

    /// Totals by kind and category over an inclusive date window
    pub async fn summary(&self, viewer: &Viewer, query: &ListQuery, window: &DateWindow) -> Result<FinanceSummary, ServiceError> {
        viewer.require(&FINANCE_READERS)?;
        if !window.is_ordered() {
            return Err(ServiceError::invalid("from", "from must not be after to"));
        }
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?;
        let (from, to) = window.closed();

        let by_category: Vec<CategoryTotal> = sqlx::query_as(
            "SELECT kind, category, SUM(amount) AS total, COUNT(*) AS count \
             FROM finance_transactions \
             WHERE church_id = $1 AND ($2::uuid IS NULL OR branch_id = $2) \
             AND transaction_date BETWEEN $3 AND $4 AND is_deleted = false \
             GROUP BY kind, category ORDER BY kind, total DESC",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(FinanceSummary::from_totals(scope, from, to, by_category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn summary_nets_income_against_expense() {
        let rows = vec![
            CategoryTotal { kind: "income".into(), category: "tithe".into(), total: dec("1200.50"), count: 10 },
            CategoryTotal { kind: "income".into(), category: "offering".into(), total: dec("300.00"), count: 4 },
            CategoryTotal { kind: "expense".into(), category: "utilities".into(), total: dec("450.25"), count: 2 },
        ];
        let scope = Scope { church_id: Uuid::new_v4(), branch_id: None };
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let summary = FinanceSummary::from_totals(scope, day, day, rows);
        assert_eq!(summary.income, dec("1500.50"));
        assert_eq!(summary.expense, dec("450.25"));
        assert_eq!(summary.net, dec("1050.25"));
    }

    #[test]
    fn amount_and_currency_rules() {
        let mut errors = FieldErrors::new();
        check_amount(&mut errors, dec("10.00"));
        assert_eq!(normalize_currency(&mut errors, " ngn "), "NGN");
        assert!(errors.into_result().is_ok());

        let mut errors = FieldErrors::new();
        check_amount(&mut errors, dec("-1"));
        normalize_currency(&mut errors, "naira");
        assert!(errors.into_result().is_err());

        let mut errors = FieldErrors::new();
        check_amount(&mut errors, dec("1.005"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        let mut errors = FieldErrors::new();
        check_amount(&mut errors, dec("10.500"));
        check_amount(&mut errors, dec("7.0000"));
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn amount_is_bounded_by_the_column() {
        assert_eq!(max_amount(), dec("999999999999.99"));

        let mut errors = FieldErrors::new();
        check_amount(&mut errors, dec("999999999999.99"));
        assert!(errors.into_result().is_ok());

        let mut errors = FieldErrors::new();
        check_amount(&mut errors, dec("1000000000000"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn transactions_reject_unknown_kinds() {
        let body = json!({
            "branch_id": Uuid::new_v4(),
            "kind": "loan",
            "category": "x",
            "amount": "5.00",
            "transaction_date": "2024-01-01"
        });
        assert!(serde_json::from_value::<CreateTransaction>(body).is_err());
    }
}
