//! Query Builder JOIN operations

use super::builder::SelectQuery;
use super::types::*;

impl SelectQuery {
    /// Append a prepared join clause
    pub fn join(mut self, clause: JoinClause) -> Self {
        self.joins.push(clause);
        self
    }

    /// Add INNER JOIN on a column pair
    pub fn inner_join(self, table: &str, alias: &str, left_col: &str, right_col: &str) -> Self {
        self.join(JoinClause {
            join_type: JoinType::Inner,
            table: table.to_string(),
            alias: alias.to_string(),
            on: vec![JoinCondition::Columns(
                left_col.to_string(),
                right_col.to_string(),
            )],
            source: None,
        })
    }

    /// Add LEFT JOIN on a column pair
    pub fn left_join(self, table: &str, alias: &str, left_col: &str, right_col: &str) -> Self {
        self.join(JoinClause {
            join_type: JoinType::Left,
            table: table.to_string(),
            alias: alias.to_string(),
            on: vec![JoinCondition::Columns(
                left_col.to_string(),
                right_col.to_string(),
            )],
            source: None,
        })
    }

    /// Remove and return the join contributed by the named association.
    ///
    /// Falls back to removing the most recently added join when no clause
    /// carries the requested provenance tag, so hand-built queries without
    /// tags still behave.
    pub fn remove_join_for(&mut self, association: &str) -> Option<JoinClause> {
        if let Some(pos) = self
            .joins
            .iter()
            .position(|j| j.source.as_deref() == Some(association))
        {
            return Some(self.joins.remove(pos));
        }
        self.joins.pop()
    }
}
