//! Query Builder Types - Core types and enums for query building

use std::fmt;

use serde_json::Value;

use super::builder::SelectQuery;

/// Query operator types
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::NotIn => write!(f, "NOT IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
            QueryOperator::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// Where clause condition.
///
/// `value` holds the operand for scalar operators, `values` the operand list
/// for IN / NOT IN, and `subquery` a nested select used as the right-hand
/// side of IN when the key set is produced by another query.
#[derive(Debug, Clone)]
pub struct WhereCondition {
    pub column: String,
    pub operator: QueryOperator,
    pub value: Option<Value>,
    pub values: Vec<Value>,
    pub subquery: Option<Box<SelectQuery>>,
}

impl WhereCondition {
    /// Equality condition
    pub fn eq<T: Into<Value>>(column: &str, value: T) -> Self {
        Self {
            column: column.to_string(),
            operator: QueryOperator::Equal,
            value: Some(value.into()),
            values: Vec::new(),
            subquery: None,
        }
    }

    /// IN condition over a literal value list
    pub fn in_list<T: Into<Value>>(column: &str, values: Vec<T>) -> Self {
        Self {
            column: column.to_string(),
            operator: QueryOperator::In,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
            subquery: None,
        }
    }

    /// IN condition over a nested select
    pub fn in_subquery(column: &str, subquery: SelectQuery) -> Self {
        Self {
            column: column.to_string(),
            operator: QueryOperator::In,
            value: None,
            values: Vec::new(),
            subquery: Some(Box::new(subquery)),
        }
    }

    /// Raw condition for predicates the typed operators cannot express
    pub fn raw(sql: &str) -> Self {
        Self {
            column: "RAW".to_string(),
            operator: QueryOperator::Equal,
            value: Some(Value::String(sql.to_string())),
            values: Vec::new(),
            subquery: None,
        }
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// A single ON predicate of a join clause
#[derive(Debug, Clone)]
pub enum JoinCondition {
    /// Column-to-column equality, both sides qualified
    Columns(String, String),
    /// Arbitrary predicate merged into the join
    Predicate(WhereCondition),
}

/// Join clause.
///
/// `source` tags the association that contributed the join, so later query
/// surgery can locate it by identity instead of by position.
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub alias: String,
    pub on: Vec<JoinCondition>,
    pub source: Option<String>,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// A projected field, optionally renamed in the result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectField {
    pub column: String,
    pub alias: Option<String>,
}

impl SelectField {
    /// Project a column under its own name
    pub fn plain(column: &str) -> Self {
        Self {
            column: column.to_string(),
            alias: None,
        }
    }

    /// Project a column under an alias
    pub fn aliased(column: &str, alias: &str) -> Self {
        Self {
            column: column.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    /// The key this field appears under in result rows
    pub fn result_key(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => match self.column.rsplit_once('.') {
                Some((_, bare)) => bare,
                None => &self.column,
            },
        }
    }
}
