//! Join planning - inline resolution of to-one associations
//!
//! `JoinPlanner::plan` is a pure function from an association plus per-call
//! overrides to a `JoinSpec`. Applying the spec to a live query (and running
//! the caller's query-mutation hook) is `attach_to`'s job.

use std::fmt;

use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::query::{JoinClause, JoinCondition, JoinType, SelectField, SelectQuery, WhereCondition};

use super::config::Association;

/// Foreign key handling for a planned join
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForeignKeyOverride {
    /// Use the association's configured foreign key
    #[default]
    Default,
    /// Use replacement column(s) for this call only
    Columns(Vec<String>),
    /// Suppress the equality predicate entirely; the override conditions
    /// stand alone
    Suppress,
}

/// Per-call overrides for one planned join
pub struct JoinOverrides {
    /// Replacement conditions merged after the association defaults
    pub conditions: Option<Vec<WhereCondition>>,
    /// Foreign key replacement or suppression
    pub foreign_key: ForeignKeyOverride,
    /// Project only these target columns
    pub fields: Option<Vec<String>>,
    /// Project nothing from the target when false
    pub include_fields: bool,
    /// Arbitrary extra mutation applied to the query after the join lands
    pub mutate: Option<Box<dyn FnOnce(SelectQuery) -> SelectQuery + Send>>,
}

impl Default for JoinOverrides {
    fn default() -> Self {
        Self {
            conditions: None,
            foreign_key: ForeignKeyOverride::Default,
            fields: None,
            include_fields: true,
            mutate: None,
        }
    }
}

impl fmt::Debug for JoinOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOverrides")
            .field("conditions", &self.conditions)
            .field("foreign_key", &self.foreign_key)
            .field("fields", &self.fields)
            .field("include_fields", &self.include_fields)
            .field("mutate", &self.mutate.is_some())
            .finish()
    }
}

/// Planned join: everything needed to attach one association inline
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub join_type: JoinType,
    pub table: String,
    pub alias: String,
    pub conditions: Vec<JoinCondition>,
    /// Aliased projection of the target; empty when fields were excluded
    pub fields: Vec<SelectField>,
    /// Association that produced this join
    pub source: String,
}

/// Computes join specs for joinable associations
pub struct JoinPlanner;

impl JoinPlanner {
    /// Plan the join for an association. Pure over its inputs.
    pub fn plan(association: &Association, overrides: &JoinOverrides) -> OrmResult<JoinSpec> {
        association.validate()?;

        let join_type = association.kind().join_type().ok_or_else(|| {
            OrmError::InvalidConfiguration(format!(
                "Association \"{}\" of kind {:?} cannot be joined inline",
                association.name(),
                association.kind()
            ))
        })?;

        let source_alias = association.source().alias();
        let target_alias = association.target().alias();

        // Association defaults first, then per-call overrides, preserving
        // append order in the rendered ON clause.
        let mut conditions: Vec<JoinCondition> = association
            .conditions()
            .iter()
            .cloned()
            .map(JoinCondition::Predicate)
            .collect();
        if let Some(extra) = &overrides.conditions {
            conditions.extend(extra.iter().cloned().map(JoinCondition::Predicate));
        }

        match &overrides.foreign_key {
            ForeignKeyOverride::Suppress => {}
            ForeignKeyOverride::Default => {
                conditions.extend(Self::key_equality(
                    association,
                    association.foreign_key(),
                    &source_alias,
                    &target_alias,
                )?);
            }
            ForeignKeyOverride::Columns(columns) => {
                conditions.extend(Self::key_equality(
                    association,
                    columns,
                    &source_alias,
                    &target_alias,
                )?);
            }
        }

        let fields = if !overrides.include_fields {
            Vec::new()
        } else {
            let columns: Vec<String> = match &overrides.fields {
                Some(subset) => subset.clone(),
                None => association.target().schema().columns().to_vec(),
            };
            columns
                .iter()
                .map(|column| {
                    let bare = column.rsplit_once('.').map_or(column.as_str(), |(_, c)| c);
                    SelectField::aliased(
                        &format!("{}.{}", target_alias, bare),
                        &format!("{}__{}", target_alias, bare),
                    )
                })
                .collect()
        };

        Ok(JoinSpec {
            join_type,
            table: association.target().table_name().to_string(),
            alias: target_alias,
            conditions,
            fields,
            source: association.name().to_string(),
        })
    }

    /// Foreign-key equality predicates for the association's key layout
    fn key_equality(
        association: &Association,
        foreign_key: &[String],
        source_alias: &str,
        target_alias: &str,
    ) -> OrmResult<Vec<JoinCondition>> {
        let (binding, binding_alias, fk_alias) = if association.kind().foreign_key_on_source() {
            (association.target().primary_key(), target_alias, source_alias)
        } else {
            (association.source().primary_key(), source_alias, target_alias)
        };

        if binding.len() != foreign_key.len() {
            return Err(OrmError::InvalidConfiguration(format!(
                "Association \"{}\" foreign key columns do not match the bound primary key",
                association.name()
            )));
        }

        Ok(binding
            .iter()
            .zip(foreign_key.iter())
            .map(|(key, fk)| {
                JoinCondition::Columns(
                    format!("{}.{}", fk_alias, fk),
                    format!("{}.{}", binding_alias, key),
                )
            })
            .collect())
    }

    /// Plan and apply the join to a live query, then run the caller's
    /// mutation hook
    pub fn attach_to(
        association: &Association,
        query: SelectQuery,
        mut overrides: JoinOverrides,
    ) -> OrmResult<SelectQuery> {
        let mutate = overrides.mutate.take();
        let spec = Self::plan(association, &overrides)?;

        debug!(
            association = association.name(),
            join = %spec.join_type,
            table = %spec.table,
            "attaching association join"
        );

        let mut query = query
            .join(JoinClause {
                join_type: spec.join_type,
                table: spec.table,
                alias: spec.alias,
                on: spec.conditions,
                source: Some(spec.source),
            })
            .select_fields(spec.fields);

        if let Some(mutate) = mutate {
            query = mutate(query);
        }

        Ok(query)
    }
}

impl Association {
    /// Attach this association to an in-flight query as an inline join
    pub fn attach_to(&self, query: SelectQuery, overrides: JoinOverrides) -> OrmResult<SelectQuery> {
        JoinPlanner::attach_to(self, query, overrides)
    }
}
