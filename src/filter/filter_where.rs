use serde_json::Value;

use super::error::FilterError;
use super::is_valid_identifier;
use super::types::{FilterOp, FilterWhereInfo, FilterWhereOptions};

pub struct FilterWhere {
    param_values: Vec<Value>,
    starting_param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            starting_param_index,
        }
    }

    /// Build a WHERE body (without the keyword) plus its positional params.
    /// The soft-delete guard is only applied at the top level.
    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut conditions = Self::soft_delete_guard(options);
        conditions.extend(filter_where.parse_object(where_data)?);
        Ok((Self::join_and(conditions), filter_where.param_values))
    }

    pub fn generate_empty(options: &FilterWhereOptions) -> (String, Vec<Value>) {
        (Self::join_and(Self::soft_delete_guard(options)), vec![])
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn soft_delete_guard(options: &FilterWhereOptions) -> Vec<String> {
        if options.include_deleted {
            vec![]
        } else {
            vec!["\"is_deleted\" = false".to_string()]
        }
    }

    fn join_and(conditions: Vec<String>) -> String {
        if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        }
    }

    fn parse_object(&mut self, where_data: &Value) -> Result<Vec<String>, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(vec![]),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut conditions = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(self.parse_logical_operator(key, value)?);
            } else {
                for info in Self::parse_field_condition(key, value)? {
                    conditions.push(self.build_sql_condition(&info)?);
                }
            }
        }
        Ok(conditions)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Err(FilterError::InvalidOperatorData(format!("{} requires at least one clause", op)));
                }
                let mut parts = Vec::new();
                for v in arr {
                    let inner = self.parse_object(v)?;
                    parts.push(format!("({})", Self::join_and(inner)));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", parts.join(joiner)))
            }
            "$not" => {
                let inner = self.parse_object(value)?;
                Ok(format!("NOT ({})", Self::join_and(inner)))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }

        let mut out = Vec::new();
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    let operator = Self::map_operator(op_key)?;
                    out.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() });
                }
            }
            // Implicit equality: { field: value }
            _ => out.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() }),
        }
        Ok(out)
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Neq,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$any" => FilterOp::Any,
            "$all" => FilterOp::All,
            "$null" => FilterOp::Null,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let col = format!("\"{}\"", condition.column);
        let data = &condition.data;
        Ok(match condition.operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", col),
            FilterOp::Eq => format!("{} = {}", col, self.param(data.clone())),
            FilterOp::Neq if data.is_null() => format!("{} IS NOT NULL", col),
            FilterOp::Neq => format!("{} <> {}", col, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", col, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", col, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", col, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", col, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", col, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", col, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let negate = condition.operator == FilterOp::NIn;
                match data {
                    Value::Array(values) if values.is_empty() => {
                        if negate { "1=1".to_string() } else { "1=0".to_string() }
                    }
                    Value::Array(values) => {
                        let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                        let keyword = if negate { "NOT IN" } else { "IN" };
                        format!("{} {} ({})", col, keyword, params.join(", "))
                    }
                    other => {
                        let op = if negate { "<>" } else { "=" };
                        format!("{} {} {}", col, op, self.param(other.clone()))
                    }
                }
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    let lo = self.param(values[0].clone());
                    let hi = self.param(values[1].clone());
                    format!("{} BETWEEN {} AND {}", col, lo, hi)
                }
                _ => return Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Any | FilterOp::All => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if condition.operator == FilterOp::Any { "1=0".to_string() } else { "1=1".to_string() });
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let op = if condition.operator == FilterOp::Any { "&&" } else { "@>" };
                format!("{} {} ARRAY[{}]", col, op, params.join(", "))
            }
            FilterOp::Null => match data {
                Value::Bool(true) => format!("{} IS NULL", col),
                Value::Bool(false) => format!("{} IS NOT NULL", col),
                _ => return Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.starting_param_index + self.param_values.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gen(where_data: Value) -> (String, Vec<Value>) {
        FilterWhere::generate(&where_data, 0, &FilterWhereOptions::default()).unwrap()
    }

    #[test]
    fn implicit_equality_and_soft_delete_guard() {
        let (sql, params) = gen(json!({ "church_id": "c1" }));
        assert_eq!(sql, "\"is_deleted\" = false AND \"church_id\" = $1");
        assert_eq!(params, vec![json!("c1")]);
    }

    #[test]
    fn include_deleted_drops_guard() {
        let opts = FilterWhereOptions { include_deleted: true };
        let (sql, _) = FilterWhere::generate(&json!({ "role": "member" }), 0, &opts).unwrap();
        assert_eq!(sql, "\"role\" = $1");
        assert_eq!(FilterWhere::generate_empty(&opts).0, "1=1");
    }

    #[test]
    fn nested_or_numbers_params_in_order() {
        let (sql, params) = gen(json!({
            "church_id": "c1",
            "$or": [
                { "first_name": { "$ilike": "%jo%" } },
                { "last_name": { "$ilike": "%jo%" } }
            ]
        }));
        assert_eq!(
            sql,
            "\"is_deleted\" = false AND \"church_id\" = $1 AND ((\"first_name\" ILIKE $2) OR (\"last_name\" ILIKE $3))"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, _) = FilterWhere::generate(&json!({ "status": "open" }), 2, &FilterWhereOptions::default()).unwrap();
        assert!(sql.ends_with("\"status\" = $3"));
    }

    #[test]
    fn in_and_between() {
        let (sql, params) = gen(json!({
            "role": { "$in": ["pastor", "bishop"] },
            "transaction_date": { "$between": ["2024-01-01", "2024-12-31"] }
        }));
        assert!(sql.contains("\"role\" IN ($1, $2)"));
        assert!(sql.contains("\"transaction_date\" BETWEEN $3 AND $4"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = gen(json!({ "id": { "$in": [] } }));
        assert!(sql.ends_with("1=0"));
        assert!(params.is_empty());
    }

    #[test]
    fn null_checks() {
        let (sql, _) = gen(json!({ "branch_id": null, "phone": { "$null": false } }));
        assert!(sql.contains("\"branch_id\" IS NULL"));
        assert!(sql.contains("\"phone\" IS NOT NULL"));
    }

    #[test]
    fn rejects_injected_column_names() {
        let err = FilterWhere::generate(&json!({ "name\" OR 1=1 --": "x" }), 0, &FilterWhereOptions::default());
        assert!(matches!(err, Err(FilterError::InvalidColumn(_))));
    }

    #[test]
    fn rejects_unknown_operators() {
        let err = FilterWhere::generate(&json!({ "name": { "$regex": "x" } }), 0, &FilterWhereOptions::default());
        assert!(matches!(err, Err(FilterError::UnsupportedOperator(_))));
    }

    #[test]
    fn object_value_without_operators_is_equality() {
        let (sql, params) = gen(json!({ "member_details": { "baptized": true } }));
        assert!(sql.ends_with("\"member_details\" = $1"));
        assert_eq!(params[0], json!({ "baptized": true }));
    }
}
