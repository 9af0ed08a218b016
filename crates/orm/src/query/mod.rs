//! Query Builder Module - value-type select builder consumed by the
//! association engine
//!
//! The builder is pure data: conditions, joins, ordering, projection, and
//! registered eager-load steps. Execution is the table contract's job.

pub mod builder;
pub mod contain;
pub mod joins;
pub mod ordering;
pub mod sql;
pub mod types;
pub mod where_clause;

pub use builder::SelectQuery;
pub use contain::ContainSpec;
pub use types::{
    JoinClause, JoinCondition, JoinType, OrderDirection, QueryOperator, SelectField,
    WhereCondition,
};
