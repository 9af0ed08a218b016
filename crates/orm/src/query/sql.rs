//! Query Builder SQL generation
//!
//! Inline-value rendering used for tracing output and tests. Parameter
//! binding is the storage layer's concern, behind the table contract.

use serde_json::Value;

use super::builder::SelectQuery;
use super::types::*;

impl SelectQuery {
    /// Convert the query to a SQL string
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();

        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }

        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            let fields: Vec<String> = self
                .select_fields
                .iter()
                .map(|field| match &field.alias {
                    Some(alias) => format!("{} AS {}", field.column, alias),
                    None => field.column.clone(),
                })
                .collect();
            sql.push_str(&fields.join(", "));
        }

        sql.push_str(&format!(" FROM {} AS {}", self.table, self.alias));

        for join in &self.joins {
            sql.push_str(&format!(" {} {} AS {}", join.join_type, join.table, join.alias));
            if !join.on.is_empty() {
                sql.push_str(" ON ");
                let conditions: Vec<String> = join
                    .on
                    .iter()
                    .map(|condition| match condition {
                        JoinCondition::Columns(left, right) => format!("{} = {}", left, right),
                        JoinCondition::Predicate(predicate) => render_condition(predicate),
                    })
                    .collect();
                sql.push_str(&conditions.join(" AND "));
            }
        }

        if !self.where_conditions.is_empty() {
            sql.push_str(" WHERE ");
            let conditions: Vec<String> = self
                .where_conditions
                .iter()
                .map(render_condition)
                .collect();
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(&order_clauses.join(", "));
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

/// Render a single condition
fn render_condition(condition: &WhereCondition) -> String {
    // Raw conditions carry their SQL in the value slot
    if condition.column == "RAW" {
        if let Some(Value::String(raw_sql)) = &condition.value {
            return raw_sql.clone();
        }
    }

    match condition.operator {
        QueryOperator::IsNull | QueryOperator::IsNotNull => {
            format!("{} {}", condition.column, condition.operator)
        }
        QueryOperator::In | QueryOperator::NotIn => {
            if let Some(subquery) = &condition.subquery {
                format!(
                    "{} {} ({})",
                    condition.column,
                    condition.operator,
                    subquery.to_sql()
                )
            } else {
                let values: Vec<String> =
                    condition.values.iter().map(format_value).collect();
                format!(
                    "{} {} ({})",
                    condition.column,
                    condition.operator,
                    values.join(", ")
                )
            }
        }
        _ => match &condition.value {
            Some(value) => format!(
                "{} {} {}",
                condition.column,
                condition.operator,
                format_value(value)
            ),
            None => format!("{} {} NULL", condition.column, condition.operator),
        },
    }
}

/// Format a value for SQL
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        _ => "NULL".to_string(),
    }
}
