//! Eager loading - keyed and correlated resolution of collection associations
//!
//! The loader issues exactly one secondary query per association, indexes the
//! fetched child rows by foreign-key value, and hands back a `RowTransform`:
//! an explicit index plus a pure `apply` that nests matched children under
//! the association's property key. No closure state survives the load.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tracing::{debug, trace};

use crate::entity::Row;
use crate::error::{OrmError, OrmResult};
use crate::query::{
    ContainSpec, JoinClause, JoinCondition, JoinType, OrderDirection, SelectField, SelectQuery,
    WhereCondition,
};
use crate::table::TableRef;

use super::config::{Association, LoadStrategy};

/// Boxed future used for the recursive load paths
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One eager-load invocation for a single association
#[derive(Debug, Clone, Default)]
pub struct EagerLoadRequest {
    /// Parent primary-key values to match (ignored by the subquery strategy)
    pub keys: Vec<Value>,
    /// Base query over the target table; defaults to `target.find()`
    pub query: Option<SelectQuery>,
    /// Override conditions, applied after the association defaults
    pub conditions: Vec<WhereCondition>,
    /// Sort override; wins over the association default
    pub sort: Vec<(String, OrderDirection)>,
    /// Field subset override; must include the foreign key
    pub fields: Option<Vec<String>>,
    /// Nested eager-load steps on the target table
    pub contain: Vec<ContainSpec>,
    /// The query that produced the parent rows; required by the subquery
    /// strategy
    pub parent_query: Option<SelectQuery>,
}

impl EagerLoadRequest {
    /// Request keyed by a set of parent identifiers
    pub fn with_keys(keys: Vec<Value>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    /// Build a request from a contain spec
    pub fn from_contain(
        spec: &ContainSpec,
        keys: Vec<Value>,
        parent_query: Option<SelectQuery>,
    ) -> Self {
        Self {
            keys,
            query: None,
            conditions: spec.conditions.clone(),
            sort: spec.sort.clone(),
            fields: spec.fields.clone(),
            contain: spec.nested.clone(),
            parent_query,
        }
    }
}

/// Child rows indexed by foreign-key value
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    by_key: HashMap<String, Vec<Row>>,
    single: bool,
}

impl RowIndex {
    /// Index holding a list of rows per key
    pub fn collection() -> Self {
        Self {
            by_key: HashMap::new(),
            single: false,
        }
    }

    /// Index holding one row per key; a later duplicate replaces the earlier
    pub fn single() -> Self {
        Self {
            by_key: HashMap::new(),
            single: true,
        }
    }

    fn insert(&mut self, key: String, row: Row) {
        if self.single {
            self.by_key.insert(key, vec![row]);
        } else {
            self.by_key.entry(key).or_default().push(row);
        }
    }

    /// Rows for a key
    pub fn get(&self, key: &str) -> Option<&[Row]> {
        self.by_key.get(key).map(|rows| rows.as_slice())
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the index holds nothing
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Post-processing step produced by an eager load
#[derive(Debug, Clone)]
pub struct RowTransform {
    property: String,
    parent_key: Vec<String>,
    index: RowIndex,
    single: bool,
    junction_prefix: Option<String>,
}

impl RowTransform {
    fn empty(association: &Association) -> Self {
        let single = !association.kind().is_collection();
        Self {
            property: association.property(),
            parent_key: association.source().primary_key().to_vec(),
            index: if single {
                RowIndex::single()
            } else {
                RowIndex::collection()
            },
            single,
            junction_prefix: None,
        }
    }

    /// Property key matched children nest under
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The built index
    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    /// Nest matched children under the parent row's property key.
    ///
    /// Parents with no matching children come back untouched - no property
    /// is set, not an empty list.
    pub fn apply(&self, mut row: Row) -> Row {
        let mut values = Vec::with_capacity(self.parent_key.len());
        for column in &self.parent_key {
            match row.get(column) {
                Some(value) if !value.is_null() => values.push(value),
                _ => return row,
            }
        }
        let key = index_key(&values);

        let Some(children) = self.index.get(&key) else {
            return row;
        };

        let nested = if self.single {
            match children.first() {
                Some(child) => Value::Object(self.reshape(child)),
                None => return row,
            }
        } else {
            Value::Array(
                children
                    .iter()
                    .map(|child| Value::Object(self.reshape(child)))
                    .collect(),
            )
        };

        row.insert(self.property.clone(), nested);
        row
    }

    /// Move junction-aliased columns of a child row into a `_join_data`
    /// sub-object; plain loads pass through untouched
    fn reshape(&self, child: &Row) -> Row {
        let Some(prefix) = &self.junction_prefix else {
            return child.clone();
        };

        let mut out = Row::new();
        let mut join_data = Row::new();
        for (column, value) in child {
            match column.strip_prefix(prefix) {
                Some(bare) => {
                    join_data.insert(bare.to_string(), value.clone());
                }
                None => {
                    out.insert(column.clone(), value.clone());
                }
            }
        }
        out.insert("_join_data".to_string(), Value::Object(join_data));
        out
    }
}

/// How the secondary query is restricted to the parent row set
enum KeyFilter {
    /// Materialized parent key list
    Keys(Vec<Value>),
    /// Correlated subquery over the parent query's join graph
    Correlated(SelectQuery),
}

/// Coordinates the select and subquery loading strategies
pub struct EagerLoader;

impl EagerLoader {
    /// Produce the post-processing step for one association.
    ///
    /// The join strategy never reaches this point; it is resolved inline
    /// when the association is attached to the parent query.
    pub fn eager_load<'a>(
        association: &'a Association,
        request: EagerLoadRequest,
    ) -> BoxFuture<'a, OrmResult<RowTransform>> {
        Box::pin(async move {
            association.validate()?;
            trace!(
                association = association.name(),
                strategy = ?association.strategy(),
                keys = request.keys.len(),
                "eager load requested"
            );

            match association.strategy() {
                LoadStrategy::Join => Err(OrmError::InvalidConfiguration(format!(
                    "Association \"{}\" uses the join strategy and is resolved inline",
                    association.name()
                ))),
                LoadStrategy::Select => {
                    if request.keys.is_empty() {
                        return Ok(RowTransform::empty(association));
                    }
                    let filter = KeyFilter::Keys(request.keys.clone());
                    Self::run(association, request, filter).await
                }
                LoadStrategy::Subquery => {
                    let parent_query = request.parent_query.clone().ok_or_else(|| {
                        OrmError::InvalidConfiguration(format!(
                            "Association \"{}\" uses the subquery strategy and needs the parent query",
                            association.name()
                        ))
                    })?;
                    let filter =
                        KeyFilter::Correlated(Self::correlation_filter(association, parent_query)?);
                    Self::run(association, request, filter).await
                }
            }
        })
    }

    /// Apply every eager-load step a query registered to its fetched rows
    pub fn load_contains(
        table: &TableRef,
        query: &SelectQuery,
        rows: Vec<Row>,
    ) -> BoxFuture<'static, OrmResult<Vec<Row>>> {
        Self::load_nested(table.clone(), query.contained().to_vec(), query.clone(), rows)
    }

    /// Prune the parent query down to a projection of the binding column.
    ///
    /// The join this association contributed is removed by provenance tag,
    /// decorrelating the subquery from the association being resolved.
    fn correlation_filter(
        association: &Association,
        parent_query: SelectQuery,
    ) -> OrmResult<SelectQuery> {
        let source = association.source();
        let binding = single_column(source.primary_key(), association.name(), "primary key")?;

        let mut pruned = parent_query;
        pruned.remove_join_for(association.name());
        Ok(pruned
            .clear_select()
            .select(&format!("{}.{}", source.alias(), binding)))
    }

    /// Build, issue, and index the secondary query
    async fn run(
        association: &Association,
        request: EagerLoadRequest,
        filter: KeyFilter,
    ) -> OrmResult<RowTransform> {
        let (query, index_column, junction_prefix) =
            Self::build_query(association, &request, filter)?;

        debug!(
            association = association.name(),
            sql = %query.to_sql(),
            "issuing eager-load query"
        );

        let target = association.target();
        let rows = target.fetch_all(&query).await?;
        let rows =
            Self::load_nested(target.clone(), request.contain.clone(), query, rows).await?;

        let single = !association.kind().is_collection();
        let mut index = if single {
            RowIndex::single()
        } else {
            RowIndex::collection()
        };
        for row in rows {
            let Some(value) = row.get(&index_column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            index.insert(index_key(&[value]), row);
        }

        Ok(RowTransform {
            property: association.property(),
            parent_key: association.source().primary_key().to_vec(),
            index,
            single,
            junction_prefix,
        })
    }

    /// Assemble the secondary query for either strategy.
    ///
    /// Returns the query, the result-row column the index is keyed on, and
    /// the junction alias prefix for many-to-many reshaping.
    fn build_query(
        association: &Association,
        request: &EagerLoadRequest,
        filter: KeyFilter,
    ) -> OrmResult<(SelectQuery, String, Option<String>)> {
        let target = association.target();

        let mut query = match &request.query {
            Some(query) => query.clone(),
            None => target.find(),
        };

        // Defaults first, overrides second; both appends are visible in the
        // generated SQL in that order.
        query = query.and_where(association.conditions().to_vec());
        query = query.and_where(request.conditions.clone());

        let sort = if !request.sort.is_empty() {
            request.sort.clone()
        } else {
            association.sort().to_vec()
        };
        query = query.order(sort);

        if association.kind().requires_junction() {
            let (query, index_column, prefix) =
                Self::junction_query(association, request, query, filter)?;
            return Ok((query, index_column, Some(prefix)));
        }

        let foreign_key =
            single_column(association.foreign_key(), association.name(), "foreign key")?;
        let qualified = format!("{}.{}", target.alias(), foreign_key);

        // Row matching depends on the foreign key; fail before executing
        // anything when a field override dropped it.
        if let Some(fields) = &request.fields {
            let has_key = fields
                .iter()
                .any(|field| field == foreign_key || *field == qualified);
            if !has_key {
                return Err(OrmError::MissingForeignKeyInProjection { column: qualified });
            }
            query = query.select_fields(fields.iter().map(|f| SelectField::plain(f)).collect());
        }

        if association.kind().is_collection() {
            query = match filter {
                KeyFilter::Keys(keys) => query.where_in(&qualified, keys),
                KeyFilter::Correlated(subquery) => query.where_in_subquery(&qualified, subquery),
            };
        }

        Ok((query, foreign_key.clone(), None))
    }

    /// The two-hop query for many-to-many loads: target rows INNER-joined to
    /// their junction rows, junction columns aliased out for reshaping
    fn junction_query(
        association: &Association,
        request: &EagerLoadRequest,
        mut query: SelectQuery,
        filter: KeyFilter,
    ) -> OrmResult<(SelectQuery, String, String)> {
        let target = association.target();
        let junction = association.junction_table()?;
        let junction_alias = junction.alias();
        let target_alias = target.alias();

        let source_key =
            single_column(association.foreign_key(), association.name(), "foreign key")?;
        let target_key = single_column(
            association.target_foreign_key(),
            association.name(),
            "target foreign key",
        )?;
        let target_binding =
            single_column(target.primary_key(), association.name(), "target primary key")?;

        let projected = match &request.fields {
            Some(fields) => fields.clone(),
            None => target.schema().columns().to_vec(),
        };
        query = query.select_fields(
            projected
                .iter()
                .map(|column| {
                    let bare = column.rsplit_once('.').map_or(column.as_str(), |(_, c)| c);
                    SelectField::plain(&format!("{}.{}", target_alias, bare))
                })
                .collect(),
        );

        let mut on = vec![JoinCondition::Columns(
            format!("{}.{}", junction_alias, target_key),
            format!("{}.{}", target_alias, target_binding),
        )];
        on.extend(
            association
                .junction_conditions()
                .iter()
                .cloned()
                .map(JoinCondition::Predicate),
        );
        query = query.join(JoinClause {
            join_type: JoinType::Inner,
            table: junction.table_name().to_string(),
            alias: junction_alias.clone(),
            on,
            source: Some(association.name().to_string()),
        });

        query = query.select_fields(
            junction
                .schema()
                .columns()
                .iter()
                .map(|column| {
                    SelectField::aliased(
                        &format!("{}.{}", junction_alias, column),
                        &format!("{}__{}", junction_alias, column),
                    )
                })
                .collect(),
        );

        let filter_column = format!("{}.{}", junction_alias, source_key);
        query = match filter {
            KeyFilter::Keys(keys) => query.where_in(&filter_column, keys),
            KeyFilter::Correlated(subquery) => query.where_in_subquery(&filter_column, subquery),
        };

        let index_column = format!("{}__{}", junction_alias, source_key);
        Ok((query, index_column, format!("{}__", junction_alias)))
    }

    /// Recursively resolve contain specs against fetched rows
    fn load_nested(
        table: TableRef,
        contains: Vec<ContainSpec>,
        parent_query: SelectQuery,
        mut rows: Vec<Row>,
    ) -> BoxFuture<'static, OrmResult<Vec<Row>>> {
        Box::pin(async move {
            if contains.is_empty() || rows.is_empty() {
                return Ok(rows);
            }

            for spec in contains {
                let association = table.association(&spec.association).ok_or_else(|| {
                    OrmError::InvalidConfiguration(format!(
                        "Table \"{}\" has no association named \"{}\"",
                        table.table_name(),
                        spec.association
                    ))
                })?;

                let keys = parent_keys(&rows, table.primary_key())?;
                let request =
                    EagerLoadRequest::from_contain(&spec, keys, Some(parent_query.clone()));
                let transform = Self::eager_load(&association, request).await?;
                rows = rows.into_iter().map(|row| transform.apply(row)).collect();
            }

            Ok(rows)
        })
    }
}

impl Association {
    /// Produce the post-processing eager-load step for this association
    pub fn eager_loader<'a>(
        &'a self,
        request: EagerLoadRequest,
    ) -> BoxFuture<'a, OrmResult<RowTransform>> {
        EagerLoader::eager_load(self, request)
    }
}

/// Distinct, ordered parent key values from fetched rows
fn parent_keys(rows: &[Row], primary_key: &[String]) -> OrmResult<Vec<Value>> {
    let column = primary_key.first().ok_or_else(|| {
        OrmError::MissingPrimaryKey("parent table declares no primary key".to_string())
    })?;

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        if let Some(value) = row.get(column) {
            if value.is_null() {
                continue;
            }
            if seen.insert(index_key(&[value])) {
                keys.push(value.clone());
            }
        }
    }
    Ok(keys)
}

/// Canonical string form of a key tuple, usable as a map key
pub(crate) fn index_key(values: &[&Value]) -> String {
    values
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Reject composite keys on paths that match by a single column
fn single_column<'a>(
    columns: &'a [String],
    association: &str,
    what: &str,
) -> OrmResult<&'a String> {
    match columns {
        [column] => Ok(column),
        _ => Err(OrmError::InvalidConfiguration(format!(
            "Association \"{}\" needs a single-column {} for keyed loading",
            association, what
        ))),
    }
}
