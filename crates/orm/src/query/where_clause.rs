//! Query Builder WHERE clause operations
//!
//! All conditions are additive AND predicates. Append order is preserved and
//! visible in the rendered SQL.

use serde_json::Value;

use super::builder::SelectQuery;
use super::types::*;

impl SelectQuery {
    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(mut self, column: &str, value: T) -> Self {
        self.where_conditions.push(WhereCondition::eq(column, value));
        self
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(mut self, column: &str, value: T) -> Self {
        self.where_conditions.push(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::NotEqual,
            value: Some(value.into()),
            values: Vec::new(),
            subquery: None,
        });
        self
    }

    /// Add WHERE condition with IN
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_conditions
            .push(WhereCondition::in_list(column, values));
        self
    }

    /// Add WHERE condition with IN over a nested select
    pub fn where_in_subquery(mut self, column: &str, subquery: SelectQuery) -> Self {
        self.where_conditions
            .push(WhereCondition::in_subquery(column, subquery));
        self
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(mut self, column: &str) -> Self {
        self.where_conditions.push(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::IsNull,
            value: None,
            values: Vec::new(),
            subquery: None,
        });
        self
    }

    /// Add raw WHERE condition for complex cases
    pub fn where_raw(mut self, raw_condition: &str) -> Self {
        self.where_conditions.push(WhereCondition::raw(raw_condition));
        self
    }

    /// Append a whole condition set (additive, AND)
    pub fn and_where(mut self, conditions: Vec<WhereCondition>) -> Self {
        self.where_conditions.extend(conditions);
        self
    }

    /// Append a single prepared condition
    pub fn where_condition(mut self, condition: WhereCondition) -> Self {
        self.where_conditions.push(condition);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_and_where_preserves_append_order() {
        let query = SelectQuery::new("articles", "Articles")
            .and_where(vec![WhereCondition::eq("Articles.published", json!(true))])
            .and_where(vec![WhereCondition::eq("Articles.featured", json!(false))]);

        let columns: Vec<&str> = query
            .conditions()
            .iter()
            .map(|c| c.column.as_str())
            .collect();
        assert_eq!(columns, vec!["Articles.published", "Articles.featured"]);
    }

    #[test]
    fn test_where_in_collects_values() {
        let query = SelectQuery::new("articles", "Articles").where_in(
            "Articles.author_id",
            vec![json!(1), json!(2)],
        );
        assert_eq!(query.conditions()[0].values.len(), 2);
    }
}
