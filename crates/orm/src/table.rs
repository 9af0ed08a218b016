//! Table contract - the storage boundary the association engine consumes
//!
//! Implementations live elsewhere (a SQL backend, an in-memory store for
//! tests). The engine only needs identity, schema, an association registry,
//! query execution, and a transaction boundary.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::{Entity, Row};
use crate::error::OrmResult;
use crate::naming::camelize;
use crate::query::{SelectQuery, WhereCondition};
use crate::relations::Association;

/// Shared handle to a table implementation
pub type TableRef = Arc<dyn Table>;

/// Column set of a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: Vec<String>,
}

impl ColumnMap {
    /// Build a column map from column names
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Column names, in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the table declares the column
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// The narrow storage contract consumed by the association engine.
///
/// One handle per table. Registered associations hang off the table so
/// traversal can resolve them by name in both directions.
#[async_trait]
pub trait Table: Send + Sync {
    /// Physical table name
    fn table_name(&self) -> &str;

    /// Alias used to qualify columns in queries
    fn alias(&self) -> String {
        camelize(self.table_name())
    }

    /// Primary key column(s)
    fn primary_key(&self) -> &[String];

    /// Declared columns
    fn schema(&self) -> &ColumnMap;

    /// Look up a registered association by name
    fn association(&self, name: &str) -> Option<Association>;

    /// Register an association on this table
    fn register_association(&self, association: Association);

    /// Start a select query over this table
    fn find(&self) -> SelectQuery {
        SelectQuery::new(self.table_name(), &self.alias())
    }

    /// Execute a select query and return the matched rows
    async fn fetch_all(&self, query: &SelectQuery) -> OrmResult<Vec<Row>>;

    /// Persist an entity through this table's save path (validation and
    /// callbacks included)
    async fn save(&self, entity: &mut Entity) -> OrmResult<()>;

    /// Delete a single entity, honoring per-row delete hooks
    async fn delete(&self, entity: &Entity) -> OrmResult<bool>;

    /// Bulk delete every row matching the conditions; returns the count.
    /// No per-row hooks run.
    async fn delete_all(&self, conditions: &[WhereCondition]) -> OrmResult<u64>;

    /// Open an explicit transaction on this table's connection
    async fn begin(&self) -> OrmResult<()> {
        Ok(())
    }

    /// Commit the open transaction
    async fn commit(&self) -> OrmResult<()> {
        Ok(())
    }

    /// Roll the open transaction back
    async fn rollback(&self) -> OrmResult<()> {
        Ok(())
    }
}
