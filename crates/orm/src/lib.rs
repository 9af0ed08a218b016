//! # lariat-orm: Association & Eager-Loading Engine
//!
//! The relationship core of an ORM: association descriptors, join planning,
//! keyed and correlated eager loading, junction-table lifecycle for
//! many-to-many links, and cascading deletes.
//!
//! Storage is consumed through the narrow [`table::Table`] contract; queries
//! are pure [`query::SelectQuery`] values; fetched rows and entities move as
//! JSON values. Nothing here owns a connection.

pub mod entity;
pub mod error;
pub mod naming;
pub mod query;
pub mod relations;
pub mod table;

// Re-export core types
pub use entity::{Entity, Row};
pub use error::{OrmError, OrmResult};
pub use query::{
    ContainSpec, JoinClause, JoinCondition, JoinType, OrderDirection, QueryOperator, SelectField,
    SelectQuery, WhereCondition,
};
pub use relations::{
    Association, BoxFuture, CascadeDeleter, EagerLoadRequest, EagerLoader, ForeignKeyOverride,
    JoinOverrides, JoinPlanner, JoinSpec, JunctionManager, LoadStrategy, RelationKind, RowIndex,
    RowTransform, SaveStrategy,
};
pub use table::{ColumnMap, Table, TableRef};
