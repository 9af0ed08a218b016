//! In-memory table implementation driving the integration suites
//!
//! `MemoryTable` interprets the query values the engine builds: joins
//! against sibling tables, IN lists and IN subqueries, ordering, aliased
//! projection, and a snapshot-based transaction boundary. Counters expose
//! how many queries, deletes, and transaction calls a scenario issued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use lariat_orm::{
    Association, ColumnMap, Entity, JoinCondition, JoinType, OrmError, OrmResult, QueryOperator,
    Row, SelectQuery, Table, WhereCondition,
};

type Tuple = Vec<(String, Row)>;

pub struct MemoryTable {
    name: String,
    primary_key: Vec<String>,
    schema: ColumnMap,
    rows: RwLock<Vec<Row>>,
    next_id: AtomicI64,
    associations: RwLock<HashMap<String, Association>>,
    siblings: RwLock<HashMap<String, Arc<MemoryTable>>>,
    queries: AtomicUsize,
    save_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    delete_all_calls: AtomicUsize,
    begin_calls: AtomicUsize,
    commit_calls: AtomicUsize,
    rollback_calls: AtomicUsize,
    snapshot: Mutex<Option<Vec<Row>>>,
    fail_saves_after: Mutex<Option<usize>>,
}

#[allow(dead_code)]
impl MemoryTable {
    pub fn new(name: &str, primary_key: &[&str], columns: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            schema: ColumnMap::new(columns.iter().copied()),
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            associations: RwLock::new(HashMap::new()),
            siblings: RwLock::new(HashMap::new()),
            queries: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            delete_all_calls: AtomicUsize::new(0),
            begin_calls: AtomicUsize::new(0),
            commit_calls: AtomicUsize::new(0),
            rollback_calls: AtomicUsize::new(0),
            snapshot: Mutex::new(None),
            fail_saves_after: Mutex::new(None),
        })
    }

    /// Wire tables together so joins and subqueries can resolve each other
    pub fn link_tables(tables: &[&Arc<MemoryTable>]) {
        for table in tables {
            for other in tables {
                if table.name != other.name {
                    table
                        .siblings
                        .write()
                        .unwrap()
                        .insert(other.name.clone(), Arc::clone(*other));
                }
            }
        }
    }

    pub fn insert(&self, pairs: &[(&str, Value)]) {
        let row: Row = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.rows.write().unwrap().push(row);
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.read().unwrap().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn delete_all_count(&self) -> usize {
        self.delete_all_calls.load(Ordering::SeqCst)
    }

    pub fn begin_count(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    /// Make saves fail once the given number have succeeded
    pub fn fail_saves_after(&self, successes: usize) {
        *self.fail_saves_after.lock().unwrap() = Some(successes);
    }

    fn sibling(&self, table: &str) -> Option<Arc<MemoryTable>> {
        self.siblings.read().unwrap().get(table).cloned()
    }

    /// Interpret a query against the stored rows. Subquery and join lookups
    /// do not count as extra round trips.
    fn run_query(&self, query: &SelectQuery) -> OrmResult<Vec<Row>> {
        let base_alias = query.alias().to_string();
        let mut tuples: Vec<Tuple> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .map(|row| vec![(base_alias.clone(), row.clone())])
            .collect();

        for join in query.joins() {
            let joined_rows = if join.table == self.name {
                self.rows()
            } else {
                self.sibling(&join.table)
                    .ok_or_else(|| {
                        OrmError::Database(format!("unknown table \"{}\" in join", join.table))
                    })?
                    .rows()
            };

            let mut next: Vec<Tuple> = Vec::new();
            for tuple in tuples {
                let mut matched = false;
                for candidate in &joined_rows {
                    let mut attempt = tuple.clone();
                    attempt.push((join.alias.clone(), candidate.clone()));
                    let mut ok = true;
                    for condition in &join.on {
                        ok = match condition {
                            JoinCondition::Columns(left, right) => {
                                let l = lookup(&attempt, left);
                                let r = lookup(&attempt, right);
                                l.is_some() && l == r
                            }
                            JoinCondition::Predicate(predicate) => self.eval(&attempt, predicate)?,
                        };
                        if !ok {
                            break;
                        }
                    }
                    if ok {
                        matched = true;
                        next.push(attempt);
                    }
                }
                if !matched && join.join_type == JoinType::Left {
                    let mut padded = tuple.clone();
                    padded.push((join.alias.clone(), Row::new()));
                    next.push(padded);
                }
            }
            tuples = next;
        }

        let mut filtered = Vec::new();
        for tuple in tuples {
            let mut keep = true;
            for condition in query.conditions() {
                if !self.eval(&tuple, condition)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                filtered.push(tuple);
            }
        }

        for (column, direction) in query.ordering().iter().rev() {
            filtered.sort_by(|a, b| {
                let ord = compare(
                    &lookup(a, column).unwrap_or(Value::Null),
                    &lookup(b, column).unwrap_or(Value::Null),
                );
                match direction {
                    lariat_orm::OrderDirection::Asc => ord,
                    lariat_orm::OrderDirection::Desc => ord.reverse(),
                }
            });
        }

        let mut out: Vec<Row> = filtered
            .into_iter()
            .map(|tuple| {
                if query.selected().is_empty() {
                    tuple
                        .iter()
                        .find(|(alias, _)| *alias == base_alias)
                        .map(|(_, row)| row.clone())
                        .unwrap_or_default()
                } else {
                    query
                        .selected()
                        .iter()
                        .map(|field| {
                            (
                                field.result_key().to_string(),
                                lookup(&tuple, &field.column).unwrap_or(Value::Null),
                            )
                        })
                        .collect()
                }
            })
            .collect();

        if let Some(offset) = query.offset_amount() {
            out = out.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = query.limit_value() {
            out.truncate(limit as usize);
        }

        Ok(out)
    }

    fn eval(&self, tuple: &Tuple, condition: &WhereCondition) -> OrmResult<bool> {
        if condition.column == "RAW" {
            return Err(OrmError::Database(
                "raw conditions are not interpreted by MemoryTable".to_string(),
            ));
        }

        let value = lookup(tuple, &condition.column).unwrap_or(Value::Null);
        let result = match condition.operator {
            QueryOperator::Equal => Some(&value) == condition.value.as_ref(),
            QueryOperator::NotEqual => Some(&value) != condition.value.as_ref(),
            QueryOperator::In | QueryOperator::NotIn => {
                let members = if let Some(subquery) = &condition.subquery {
                    self.resolve_subquery(subquery)?
                } else {
                    condition.values.clone()
                };
                let contained = members.contains(&value);
                if condition.operator == QueryOperator::In {
                    contained
                } else {
                    !contained
                }
            }
            QueryOperator::IsNull => value.is_null(),
            QueryOperator::IsNotNull => !value.is_null(),
            QueryOperator::GreaterThan => compare(&value, condition.value.as_ref().unwrap_or(&Value::Null)).is_gt(),
            QueryOperator::GreaterThanOrEqual => !compare(&value, condition.value.as_ref().unwrap_or(&Value::Null)).is_lt(),
            QueryOperator::LessThan => compare(&value, condition.value.as_ref().unwrap_or(&Value::Null)).is_lt(),
            QueryOperator::LessThanOrEqual => !compare(&value, condition.value.as_ref().unwrap_or(&Value::Null)).is_gt(),
            QueryOperator::Like => {
                return Err(OrmError::Database(
                    "LIKE is not interpreted by MemoryTable".to_string(),
                ))
            }
        };
        Ok(result)
    }

    /// Project the subquery's single selected column into a value list
    fn resolve_subquery(&self, subquery: &SelectQuery) -> OrmResult<Vec<Value>> {
        let owner = if subquery.table() == self.name {
            None
        } else {
            Some(self.sibling(subquery.table()).ok_or_else(|| {
                OrmError::Database(format!(
                    "unknown table \"{}\" in subquery",
                    subquery.table()
                ))
            })?)
        };
        let rows = match &owner {
            Some(table) => table.run_query(subquery)?,
            None => self.run_query(subquery)?,
        };

        let key = subquery
            .selected()
            .first()
            .map(|field| field.result_key().to_string())
            .ok_or_else(|| OrmError::Database("subquery projects no column".to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(&key))
            .collect())
    }
}

#[async_trait]
impl Table for MemoryTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    fn schema(&self) -> &ColumnMap {
        &self.schema
    }

    fn association(&self, name: &str) -> Option<Association> {
        self.associations.read().unwrap().get(name).cloned()
    }

    fn register_association(&self, association: Association) {
        self.associations
            .write()
            .unwrap()
            .insert(association.name().to_string(), association);
    }

    async fn fetch_all(&self, query: &SelectQuery) -> OrmResult<Vec<Row>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.run_query(query)
    }

    async fn save(&self, entity: &mut Entity) -> OrmResult<()> {
        if let Some(limit) = *self.fail_saves_after.lock().unwrap() {
            if self.save_calls.load(Ordering::SeqCst) >= limit {
                return Err(OrmError::Database("save failed".to_string()));
            }
        }
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        if entity.is_new() {
            if let [pk] = self.primary_key.as_slice() {
                if entity.get(pk).is_none() {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    entity.set(pk, Value::from(id));
                }
            }
            self.rows.write().unwrap().push(entity.to_row());
        } else {
            let identity: Vec<Value> = self
                .primary_key
                .iter()
                .filter_map(|c| entity.get(c).cloned())
                .collect();
            let mut rows = self.rows.write().unwrap();
            for row in rows.iter_mut() {
                let matches = self
                    .primary_key
                    .iter()
                    .zip(identity.iter())
                    .all(|(c, v)| row.get(c) == Some(v));
                if matches {
                    *row = entity.to_row();
                    break;
                }
            }
        }
        entity.mark_persisted();
        Ok(())
    }

    async fn delete(&self, entity: &Entity) -> OrmResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|row| {
            !self
                .primary_key
                .iter()
                .all(|c| row.get(c).is_some() && row.get(c) == entity.get(c))
        });
        Ok(rows.len() < before)
    }

    async fn delete_all(&self, conditions: &[WhereCondition]) -> OrmResult<u64> {
        self.delete_all_calls.fetch_add(1, Ordering::SeqCst);
        let alias = self.alias();
        let snapshot = self.rows();
        let mut doomed = Vec::new();
        for row in &snapshot {
            let tuple: Tuple = vec![(alias.clone(), row.clone())];
            let mut matches = true;
            for condition in conditions {
                if !self.eval(&tuple, condition)? {
                    matches = false;
                    break;
                }
            }
            if matches {
                doomed.push(row.clone());
            }
        }

        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|row| !doomed.contains(row));
        Ok((before - rows.len()) as u64)
    }

    async fn begin(&self) -> OrmResult<()> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap() = Some(self.rows());
        Ok(())
    }

    async fn commit(&self) -> OrmResult<()> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap() = None;
        Ok(())
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(saved) = self.snapshot.lock().unwrap().take() {
            *self.rows.write().unwrap() = saved;
        }
        Ok(())
    }
}

/// Resolve a possibly-qualified column against a joined row tuple
fn lookup(tuple: &Tuple, column: &str) -> Option<Value> {
    if let Some((alias, bare)) = column.split_once('.') {
        return tuple
            .iter()
            .find(|(a, _)| a == alias)
            .and_then(|(_, row)| row.get(bare).cloned());
    }
    tuple
        .iter()
        .find_map(|(_, row)| row.get(column).cloned())
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering as O;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(O::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => O::Equal,
        (Value::Null, _) => O::Less,
        (_, Value::Null) => O::Greater,
        _ => O::Equal,
    }
}

/// Persisted entity with the given fields
#[allow(dead_code)]
pub fn persisted(pairs: &[(&str, Value)]) -> Entity {
    let row: Row = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Entity::from_row(row)
}
