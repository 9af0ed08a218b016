//! Cascade deletes - dependent-record removal when a source row is deleted
//!
//! Two modes: a single bulk delete (fast, no hooks) or find-and-delete-each
//! (slow, per-row hooks run). Per-row mode fails fast: the first failing
//! delete aborts iteration and propagates, leaving earlier deletions in
//! place - the caller owns any outer transaction.

use tracing::debug;

use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::query::WhereCondition;

use super::config::Association;
use super::kind::RelationKind;

/// Removes dependent rows for an association
pub struct CascadeDeleter;

impl CascadeDeleter {
    /// Delete the rows depending on `source` through this association.
    ///
    /// Returns `false` without touching storage when the association is not
    /// dependent. The owning side of a to-one link never cascades.
    pub async fn cascade_delete(association: &Association, source: &Entity) -> OrmResult<bool> {
        association.validate()?;

        if !association.dependent() || association.kind() == RelationKind::BelongsTo {
            return Ok(false);
        }

        let (table, key_columns, defaults) = if association.kind().requires_junction() {
            (
                association.junction_table()?.clone(),
                association.foreign_key().to_vec(),
                association.junction_conditions().to_vec(),
            )
        } else {
            (
                association.target().clone(),
                association.foreign_key().to_vec(),
                association.conditions().to_vec(),
            )
        };

        let source_values = source
            .extract(association.source().primary_key())
            .ok_or_else(|| {
                OrmError::MissingPrimaryKey(format!(
                    "source entity of association \"{}\" has no resolvable primary key",
                    association.name()
                ))
            })?;
        if key_columns.len() != source_values.len() {
            return Err(OrmError::InvalidConfiguration(format!(
                "Association \"{}\" foreign key columns do not match the source primary key",
                association.name()
            )));
        }

        let alias = table.alias();
        let mut conditions = defaults;
        conditions.extend(
            key_columns
                .iter()
                .zip(source_values)
                .map(|(column, value)| {
                    WhereCondition::eq(&format!("{}.{}", alias, column), value)
                }),
        );

        if !association.cascade_callbacks() {
            let deleted = table.delete_all(&conditions).await?;
            debug!(
                association = association.name(),
                table = table.table_name(),
                deleted,
                "cascade bulk delete"
            );
            return Ok(true);
        }

        let query = table.find().and_where(conditions);
        let rows = table.fetch_all(&query).await?;
        let total = rows.len();
        for row in rows {
            table.delete(&Entity::from_row(row)).await?;
        }
        debug!(
            association = association.name(),
            table = table.table_name(),
            deleted = total,
            "cascade delete with callbacks"
        );
        Ok(true)
    }
}

impl Association {
    /// Cascade this association's dependent rows for a deleted source entity
    pub async fn cascade_delete(&self, source: &Entity) -> OrmResult<bool> {
        CascadeDeleter::cascade_delete(self, source).await
    }
}
