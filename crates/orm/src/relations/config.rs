//! Association configuration - immutable descriptor of one relationship
//!
//! An `Association` ties a source table to a target table: kind, foreign
//! key(s), default conditions and sort, loading strategy, and lifecycle
//! flags. Junction handles for many-to-many links are injected by the
//! caller; there is no table registry to consult.

use std::fmt;
use std::str::FromStr;

use crate::error::{OrmError, OrmResult};
use crate::naming::{default_foreign_key, property_name};
use crate::query::{OrderDirection, WhereCondition};
use crate::table::TableRef;

use super::kind::RelationKind;

/// How an association is resolved when eager-loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStrategy {
    /// Inline join on the parent query
    Join,
    /// One secondary query keyed by the parent identifiers
    Select,
    /// One secondary query filtered by a correlated subquery
    Subquery,
}

/// How linked records are persisted for many-to-many associations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SaveStrategy {
    /// New links are added next to existing ones
    #[default]
    Append,
    /// Saving replaces the whole link set
    Replace,
}

impl FromStr for SaveStrategy {
    type Err = OrmError;

    fn from_str(value: &str) -> OrmResult<Self> {
        match value {
            "append" => Ok(Self::Append),
            "replace" => Ok(Self::Replace),
            other => Err(OrmError::InvalidConfiguration(format!(
                "Invalid save strategy \"{}\", expected \"append\" or \"replace\"",
                other
            ))),
        }
    }
}

/// Immutable descriptor of a relationship between two tables
#[derive(Clone)]
pub struct Association {
    name: String,
    kind: RelationKind,
    source: TableRef,
    target: TableRef,
    foreign_key: Vec<String>,
    target_foreign_key: Vec<String>,
    conditions: Vec<WhereCondition>,
    junction_conditions: Vec<WhereCondition>,
    sort: Vec<(String, OrderDirection)>,
    strategy: LoadStrategy,
    dependent: bool,
    cascade_callbacks: bool,
    save_strategy: SaveStrategy,
    junction: Option<TableRef>,
    junction_timestamps: bool,
    property: Option<String>,
}

impl Association {
    fn base(
        name: &str,
        kind: RelationKind,
        source: TableRef,
        target: TableRef,
        foreign_key: String,
        strategy: LoadStrategy,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            source,
            target,
            foreign_key: vec![foreign_key],
            target_foreign_key: Vec::new(),
            conditions: Vec::new(),
            junction_conditions: Vec::new(),
            sort: Vec::new(),
            strategy,
            dependent: false,
            cascade_callbacks: false,
            save_strategy: SaveStrategy::default(),
            junction: None,
            junction_timestamps: false,
            property: None,
        }
    }

    /// To-one association with the foreign key on the source table
    pub fn belongs_to(name: &str, source: TableRef, target: TableRef) -> Self {
        let foreign_key = default_foreign_key(target.table_name());
        Self::base(
            name,
            RelationKind::BelongsTo,
            source,
            target,
            foreign_key,
            LoadStrategy::Join,
        )
    }

    /// To-one association with the foreign key on the target table
    pub fn has_one(name: &str, source: TableRef, target: TableRef) -> Self {
        let foreign_key = default_foreign_key(source.table_name());
        Self::base(
            name,
            RelationKind::HasOne,
            source,
            target,
            foreign_key,
            LoadStrategy::Join,
        )
    }

    /// To-many association with the foreign key on the target table
    pub fn has_many(name: &str, source: TableRef, target: TableRef) -> Self {
        let foreign_key = default_foreign_key(source.table_name());
        Self::base(
            name,
            RelationKind::HasMany,
            source,
            target,
            foreign_key,
            LoadStrategy::Select,
        )
    }

    /// Many-to-many association through an injected junction table
    pub fn many_to_many(
        name: &str,
        source: TableRef,
        target: TableRef,
        junction: TableRef,
    ) -> Self {
        let foreign_key = default_foreign_key(source.table_name());
        let target_foreign_key = default_foreign_key(target.table_name());
        let mut association = Self::base(
            name,
            RelationKind::ManyToMany,
            source,
            target,
            foreign_key,
            LoadStrategy::Select,
        );
        association.target_foreign_key = vec![target_foreign_key];
        association.junction = Some(junction);
        association
    }

    /// Override the foreign key column(s)
    pub fn with_foreign_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.foreign_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Override the target-side foreign key column(s) on the junction
    pub fn with_target_foreign_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_foreign_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Extra predicates merged into every join and eager-load query
    pub fn with_conditions(mut self, conditions: Vec<WhereCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Extra predicates applied to junction rows
    pub fn with_junction_conditions(mut self, conditions: Vec<WhereCondition>) -> Self {
        self.junction_conditions = conditions;
        self
    }

    /// Default ordering for many-valued loads
    pub fn with_sort(mut self, sort: Vec<(String, OrderDirection)>) -> Self {
        self.sort = sort;
        self
    }

    /// Loading strategy; legality is checked by `validate`
    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Whether deleting a source row cascades to target rows
    pub fn with_dependent(mut self, dependent: bool) -> Self {
        self.dependent = dependent;
        self
    }

    /// Whether cascade deletes run per-row delete hooks
    pub fn with_cascade_callbacks(mut self, cascade_callbacks: bool) -> Self {
        self.cascade_callbacks = cascade_callbacks;
        self
    }

    /// Link persistence mode for many-to-many associations
    pub fn with_save_strategy(mut self, save_strategy: SaveStrategy) -> Self {
        self.save_strategy = save_strategy;
        self
    }

    /// Link persistence mode parsed from configuration text
    pub fn with_save_strategy_str(mut self, save_strategy: &str) -> OrmResult<Self> {
        self.save_strategy = save_strategy.parse()?;
        Ok(self)
    }

    /// Stamp `created_at` on junction rows when linking
    pub fn with_junction_timestamps(mut self, junction_timestamps: bool) -> Self {
        self.junction_timestamps = junction_timestamps;
        self
    }

    /// Override the property key loaded rows nest under
    pub fn with_property(mut self, property: &str) -> Self {
        self.property = Some(property.to_string());
        self
    }

    /// Association name, unique per source table
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relationship kind
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Source table handle
    pub fn source(&self) -> &TableRef {
        &self.source
    }

    /// Target table handle
    pub fn target(&self) -> &TableRef {
        &self.target
    }

    /// Foreign key column(s); on the source for BelongsTo, on the target for
    /// HasOne/HasMany, and the source side of the junction for ManyToMany
    pub fn foreign_key(&self) -> &[String] {
        &self.foreign_key
    }

    /// Target-side foreign key column(s) on the junction (ManyToMany only)
    pub fn target_foreign_key(&self) -> &[String] {
        &self.target_foreign_key
    }

    /// Default conditions on the target table
    pub fn conditions(&self) -> &[WhereCondition] {
        &self.conditions
    }

    /// Default conditions on junction rows
    pub fn junction_conditions(&self) -> &[WhereCondition] {
        &self.junction_conditions
    }

    /// Default sort order
    pub fn sort(&self) -> &[(String, OrderDirection)] {
        &self.sort
    }

    /// Loading strategy
    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Whether deletes cascade to the target
    pub fn dependent(&self) -> bool {
        self.dependent
    }

    /// Whether cascades run per-row hooks
    pub fn cascade_callbacks(&self) -> bool {
        self.cascade_callbacks
    }

    /// Link persistence mode
    pub fn save_strategy(&self) -> SaveStrategy {
        self.save_strategy
    }

    /// Injected junction handle, if any
    pub fn junction(&self) -> Option<&TableRef> {
        self.junction.as_ref()
    }

    /// Junction handle, or a configuration error for non-junction kinds
    pub fn junction_table(&self) -> OrmResult<&TableRef> {
        self.junction.as_ref().ok_or_else(|| {
            OrmError::InvalidConfiguration(format!(
                "Association \"{}\" has no junction table configured",
                self.name
            ))
        })
    }

    /// Replace the junction handle
    pub fn set_junction(&mut self, junction: TableRef) {
        self.junction = Some(junction);
    }

    /// Whether junction rows get a `created_at` stamp on link
    pub fn junction_timestamps(&self) -> bool {
        self.junction_timestamps
    }

    /// Property key loaded rows nest under
    pub fn property(&self) -> String {
        match &self.property {
            Some(property) => property.clone(),
            None => property_name(&self.name),
        }
    }

    /// Whether eager loading needs a materialized parent key list.
    /// The subquery strategy decorrelates and does not.
    pub fn requires_keys(&self) -> bool {
        self.strategy != LoadStrategy::Subquery
    }

    /// Check the descriptor for consistency.
    ///
    /// Joinable kinds are only ever resolved inline; collection kinds only
    /// ever through a secondary query. Junction kinds need their handle.
    pub fn validate(&self) -> OrmResult<()> {
        if self.foreign_key.is_empty() {
            return Err(OrmError::InvalidConfiguration(format!(
                "Association \"{}\" must declare at least one foreign key column",
                self.name
            )));
        }

        match self.strategy {
            LoadStrategy::Join if !self.kind.can_be_joined() => {
                return Err(OrmError::InvalidConfiguration(format!(
                    "Association \"{}\" of kind {:?} cannot use the join strategy",
                    self.name, self.kind
                )));
            }
            LoadStrategy::Select | LoadStrategy::Subquery if self.kind.can_be_joined() => {
                return Err(OrmError::InvalidConfiguration(format!(
                    "Association \"{}\" of kind {:?} is resolved by inline join only",
                    self.name, self.kind
                )));
            }
            _ => {}
        }

        if self.kind.requires_junction() {
            if self.junction.is_none() {
                return Err(OrmError::InvalidConfiguration(format!(
                    "Association \"{}\" requires a junction table handle",
                    self.name
                )));
            }
            if self.target_foreign_key.is_empty() {
                return Err(OrmError::InvalidConfiguration(format!(
                    "Association \"{}\" must declare a target foreign key on the junction",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.source.table_name())
            .field("target", &self.target.table_name())
            .field("foreign_key", &self.foreign_key)
            .field("strategy", &self.strategy)
            .field("dependent", &self.dependent)
            .finish()
    }
}
