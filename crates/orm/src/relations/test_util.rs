//! Stub table handle for unit tests that never touch storage

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::entity::{Entity, Row};
use crate::error::OrmResult;
use crate::query::{SelectQuery, WhereCondition};
use crate::table::{ColumnMap, Table, TableRef};

use super::Association;

pub(crate) struct StubTable {
    name: String,
    primary_key: Vec<String>,
    schema: ColumnMap,
    associations: RwLock<HashMap<String, Association>>,
}

impl StubTable {
    pub(crate) fn handle(name: &str, primary_key: &[&str], columns: &[&str]) -> TableRef {
        Arc::new(Self {
            name: name.to_string(),
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            schema: ColumnMap::new(columns.iter().copied()),
            associations: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl Table for StubTable {
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

    async fn fetch_all(&self, _query: &SelectQuery) -> OrmResult<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn save(&self, entity: &mut Entity) -> OrmResult<()> {
        entity.mark_persisted();
        Ok(())
    }

    async fn delete(&self, _entity: &Entity) -> OrmResult<bool> {
        Ok(true)
    }

    async fn delete_all(&self, _conditions: &[WhereCondition]) -> OrmResult<u64> {
        Ok(0)
    }
}
