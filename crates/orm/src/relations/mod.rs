//! Relations Module - association modeling, join planning, eager loading,
//! junction lifecycle, and cascade deletes
//!
//! Control flow: callers ask an association to attach itself to an in-flight
//! query (join strategy) or to produce a post-processing eager-load step
//! (select/subquery strategies). Junction and cascade operations hang off
//! the same descriptor.

pub mod cascade;
pub mod config;
pub mod eager;
pub mod join;
pub mod junction;
pub mod kind;

#[cfg(test)]
pub(crate) mod test_util;

pub use cascade::CascadeDeleter;
pub use config::{Association, LoadStrategy, SaveStrategy};
pub use eager::{BoxFuture, EagerLoadRequest, EagerLoader, RowIndex, RowTransform};
pub use join::{ForeignKeyOverride, JoinOverrides, JoinPlanner, JoinSpec};
pub use junction::JunctionManager;
pub use kind::RelationKind;
