//! Query Builder - Core builder implementation

use super::contain::ContainSpec;
use super::types::*;

/// Select query builder for a single base table.
///
/// A pure value: building never touches storage. Execution happens through
/// the owning table handle.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub(crate) table: String,
    pub(crate) alias: String,
    pub(crate) select_fields: Vec<SelectField>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    pub(crate) distinct: bool,
    pub(crate) contains: Vec<ContainSpec>,
}

impl SelectQuery {
    /// Create a new query over a base table
    pub fn new(table: &str, alias: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: alias.to_string(),
            select_fields: Vec::new(),
            where_conditions: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            distinct: false,
            contains: Vec::new(),
        }
    }

    /// Base table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Base table alias
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Project a column
    pub fn select(mut self, column: &str) -> Self {
        self.select_fields.push(SelectField::plain(column));
        self
    }

    /// Project a column under an alias
    pub fn select_as(mut self, column: &str, alias: &str) -> Self {
        self.select_fields.push(SelectField::aliased(column, alias));
        self
    }

    /// Append a batch of projected fields
    pub fn select_fields(mut self, fields: Vec<SelectField>) -> Self {
        self.select_fields.extend(fields);
        self
    }

    /// Drop the current projection (back to SELECT *)
    pub fn clear_select(mut self) -> Self {
        self.select_fields.clear();
        self
    }

    /// Projected fields
    pub fn selected(&self) -> &[SelectField] {
        &self.select_fields
    }

    /// Current where conditions
    pub fn conditions(&self) -> &[WhereCondition] {
        &self.where_conditions
    }

    /// Current join clauses
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Current order spec
    pub fn ordering(&self) -> &[(String, OrderDirection)] {
        &self.order_by
    }

    /// Registered eager-load steps
    pub fn contained(&self) -> &[ContainSpec] {
        &self.contains
    }

    /// Configured row limit
    pub fn limit_value(&self) -> Option<i64> {
        self.limit_count
    }

    /// Configured row offset
    pub fn offset_amount(&self) -> Option<i64> {
        self.offset_value
    }

    /// Register an eager-load step for an association
    pub fn contain(mut self, spec: ContainSpec) -> Self {
        self.contains.push(spec);
        self
    }

    /// Register an eager-load step by association name
    pub fn contain_name(self, association: &str) -> Self {
        self.contain(ContainSpec::new(association))
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Skip rows before returning
    pub fn offset(mut self, count: i64) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// Deduplicate result rows
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}
