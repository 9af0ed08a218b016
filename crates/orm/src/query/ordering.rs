//! Query Builder ORDER BY operations

use super::builder::SelectQuery;
use super::types::OrderDirection;

impl SelectQuery {
    /// Add ascending ORDER BY
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Add descending ORDER BY
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by
            .push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Append a whole order spec
    pub fn order(mut self, spec: Vec<(String, OrderDirection)>) -> Self {
        self.order_by.extend(spec);
        self
    }
}
