//! Junction lifecycle - linking, unlinking, and replacing many-to-many rows
//!
//! The junction table handle is injected on the association; first access
//! binds it by registering the reciprocal sub-associations, memoized for the
//! life of the manager. Link mutations run inside an explicit transaction on
//! the junction's connection.

use std::collections::HashSet;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{debug, trace};

use crate::entity::{Entity, Row};
use crate::error::{OrmError, OrmResult};
use crate::naming::junction_table_name;
use crate::table::TableRef;

use super::config::{Association, SaveStrategy};
use super::eager::index_key;
use super::kind::RelationKind;

/// Resolved junction binding: the handle plus its two key columns
struct JunctionBinding {
    junction: TableRef,
    source_key: String,
    target_key: String,
}

/// Manages junction rows for one many-to-many association
pub struct JunctionManager {
    association: Association,
    binding: OnceCell<JunctionBinding>,
}

impl JunctionManager {
    /// Wrap a many-to-many association
    pub fn new(association: Association) -> OrmResult<Self> {
        association.validate()?;
        if association.kind() != RelationKind::ManyToMany {
            return Err(OrmError::InvalidConfiguration(format!(
                "Association \"{}\" of kind {:?} has no junction lifecycle",
                association.name(),
                association.kind()
            )));
        }
        Ok(Self {
            association,
            binding: OnceCell::new(),
        })
    }

    /// The wrapped association
    pub fn association(&self) -> &Association {
        &self.association
    }

    /// Resolve the junction handle, binding it on first access.
    ///
    /// Binding registers two owning-side associations on the junction (one
    /// per end) and, reciprocally, a has-many over the junction rows plus a
    /// many-to-many back to the source on the target table, so traversal is
    /// symmetric. Idempotent; memoized after the first call.
    pub fn junction(&self) -> OrmResult<&TableRef> {
        Ok(&self.binding()?.junction)
    }

    /// Replace the junction handle; the next access re-binds
    pub fn set_junction(&mut self, junction: TableRef) {
        self.association.set_junction(junction);
        self.binding = OnceCell::new();
    }

    fn bind(&self) -> OrmResult<JunctionBinding> {
        let association = &self.association;
        let junction = association.junction_table()?.clone();
        let source = association.source().clone();
        let target = association.target().clone();

        let source_key = single_key(association.foreign_key(), association.name())?;
        let target_key = single_key(association.target_foreign_key(), association.name())?;

        let conventional = junction_table_name(source.table_name(), target.table_name());
        if junction.table_name() != conventional {
            trace!(
                junction = junction.table_name(),
                conventional = %conventional,
                "junction table name overrides the convention"
            );
        }

        let source_alias = source.alias();
        let target_alias = target.alias();
        let junction_alias = junction.alias();

        if junction.association(&source_alias).is_none() {
            junction.register_association(
                Association::belongs_to(&source_alias, junction.clone(), source.clone())
                    .with_foreign_key([source_key.clone()]),
            );
        }
        if junction.association(&target_alias).is_none() {
            junction.register_association(
                Association::belongs_to(&target_alias, junction.clone(), target.clone())
                    .with_foreign_key([target_key.clone()]),
            );
        }
        if target.association(&junction_alias).is_none() {
            target.register_association(
                Association::has_many(&junction_alias, target.clone(), junction.clone())
                    .with_foreign_key([target_key.clone()]),
            );
        }
        if target.association(&source_alias).is_none() {
            target.register_association(
                Association::many_to_many(&source_alias, target.clone(), source, junction.clone())
                    .with_foreign_key([target_key.clone()])
                    .with_target_foreign_key([source_key.clone()]),
            );
        }

        debug!(
            association = association.name(),
            junction = junction.table_name(),
            "junction table bound"
        );

        Ok(JunctionBinding {
            junction,
            source_key,
            target_key,
        })
    }

    fn binding(&self) -> OrmResult<&JunctionBinding> {
        self.binding.get_or_try_init(|| self.bind())
    }

    /// Link every target entity to the source through new junction rows.
    ///
    /// Each junction row carries the two foreign keys plus any pivot data the
    /// target holds under `_join_data`. Rows go through the junction table's
    /// own save path, inside one transaction. On success the source's
    /// association property is replaced with the full target list.
    pub async fn link(&self, source: &mut Entity, targets: &[Entity]) -> OrmResult<bool> {
        let binding = self.binding()?;
        self.ensure_persisted(source, self.association.source(), "source")?;
        for target in targets {
            self.ensure_persisted(target, self.association.target(), "target")?;
        }

        let junction = &binding.junction;
        junction.begin().await?;
        match self.insert_rows(binding, source, targets).await {
            Ok(()) => junction.commit().await?,
            Err(err) => {
                junction.rollback().await?;
                return Err(err);
            }
        }

        let property = self.association.property();
        source.set(&property, entity_list(targets));

        debug!(
            association = self.association.name(),
            linked = targets.len(),
            "junction rows linked"
        );
        Ok(true)
    }

    /// Remove the junction rows tying the targets to the source.
    ///
    /// Matching rows are resolved one query per target (junction conditions
    /// plus both keys), unioned, then deleted individually so per-row delete
    /// hooks run. When `clean_property` the unlinked entities are also
    /// removed from the source's in-memory property; otherwise it is left
    /// untouched.
    pub async fn unlink(
        &self,
        source: &mut Entity,
        targets: &[Entity],
        clean_property: bool,
    ) -> OrmResult<()> {
        let binding = self.binding()?;
        self.ensure_persisted(source, self.association.source(), "source")?;
        for target in targets {
            self.ensure_persisted(target, self.association.target(), "target")?;
        }

        let junction = &binding.junction;
        junction.begin().await?;
        match self.delete_matching(binding, source, targets).await {
            Ok(deleted) => {
                junction.commit().await?;
                debug!(
                    association = self.association.name(),
                    unlinked = deleted,
                    "junction rows unlinked"
                );
            }
            Err(err) => {
                junction.rollback().await?;
                return Err(err);
            }
        }

        if clean_property {
            self.remove_from_property(source, targets);
        }
        Ok(())
    }

    /// Make the stored link set exactly `targets`.
    ///
    /// Existing junction rows whose target key is absent from the new set are
    /// deleted first; targets not yet linked are inserted through the same
    /// path as `link`. The association property is then set to the
    /// replacement list and marked clean - it is in sync with storage, not
    /// merely changed.
    pub async fn replace_links(&self, source: &mut Entity, targets: &[Entity]) -> OrmResult<bool> {
        let binding = self.binding()?;

        let source_table = self.association.source();
        if source.extract(source_table.primary_key()).is_none() {
            return Err(OrmError::MissingPrimaryKey(format!(
                "source entity of association \"{}\" has no resolvable primary key",
                self.association.name()
            )));
        }

        let junction = &binding.junction;
        junction.begin().await?;
        match self.reconcile(binding, source, targets).await {
            Ok((deleted, inserted)) => {
                junction.commit().await?;
                debug!(
                    association = self.association.name(),
                    deleted,
                    inserted,
                    "junction rows replaced"
                );
            }
            Err(err) => {
                junction.rollback().await?;
                return Err(err);
            }
        }

        let property = self.association.property();
        source.set(&property, entity_list(targets));
        source.clean(&property);
        Ok(true)
    }

    /// Persist the target set the way the association's save strategy asks:
    /// append next to existing links, or replace the whole set
    pub async fn save_links(&self, source: &mut Entity, targets: &[Entity]) -> OrmResult<bool> {
        match self.association.save_strategy() {
            SaveStrategy::Append => self.link(source, targets).await,
            SaveStrategy::Replace => self.replace_links(source, targets).await,
        }
    }

    /// Diff the stored link set against the desired one and apply it
    async fn reconcile(
        &self,
        binding: &JunctionBinding,
        source: &Entity,
        targets: &[Entity],
    ) -> OrmResult<(usize, usize)> {
        let association = &self.association;
        let junction = &binding.junction;
        let junction_alias = junction.alias();

        let source_value = self.source_key_value(source)?;

        let query = junction
            .find()
            .and_where(association.junction_conditions().to_vec())
            .where_eq(
                &format!("{}.{}", junction_alias, binding.source_key),
                source_value.clone(),
            );
        let existing = junction.fetch_all(&query).await?;

        let existing_keys: HashSet<String> = existing
            .iter()
            .filter_map(|row| row.get(&binding.target_key))
            .filter(|value| !value.is_null())
            .map(|value| index_key(&[value]))
            .collect();

        let target_table = association.target();
        let mut desired_keys = HashSet::new();
        let mut to_insert = Vec::new();
        for target in targets {
            match target.extract(target_table.primary_key()) {
                Some(values) => {
                    let key = index_key(&values.iter().collect::<Vec<_>>());
                    if !existing_keys.contains(&key) {
                        to_insert.push(target.clone());
                    }
                    desired_keys.insert(key);
                }
                // No identity yet: cannot already be linked
                None => to_insert.push(target.clone()),
            }
        }

        let mut deleted = 0;
        for row in existing {
            let keep = row
                .get(&binding.target_key)
                .filter(|value| !value.is_null())
                .map(|value| desired_keys.contains(&index_key(&[value])))
                .unwrap_or(false);
            if !keep {
                junction.delete(&Entity::from_row(row)).await?;
                deleted += 1;
            }
        }

        for target in &to_insert {
            self.ensure_persisted(target, target_table, "target")?;
        }
        let inserted = to_insert.len();
        self.insert_rows(binding, source, &to_insert).await?;

        Ok((deleted, inserted))
    }

    /// Build and save one junction row per target
    async fn insert_rows(
        &self,
        binding: &JunctionBinding,
        source: &Entity,
        targets: &[Entity],
    ) -> OrmResult<()> {
        let association = &self.association;
        let source_value = self.source_key_value(source)?;
        let target_table = association.target();

        for target in targets {
            self.ensure_persisted(target, target_table, "target")?;
            let target_values = target
                .extract(target_table.primary_key())
                .ok_or_else(|| {
                    OrmError::UnpersistedEntity(format!(
                        "target entity of association \"{}\"",
                        association.name()
                    ))
                })?;

            let mut link = Entity::new();
            link.set(&binding.source_key, source_value.clone());
            link.set(&binding.target_key, target_values[0].clone());

            // Pivot data rides along on the target under `_join_data`
            if let Some(Value::Object(pivot)) = target.get("_join_data") {
                for (column, value) in pivot {
                    if column != &binding.source_key && column != &binding.target_key {
                        link.set(column, value.clone());
                    }
                }
            }

            if association.junction_timestamps() {
                link.set(
                    "created_at",
                    Value::String(chrono::Utc::now().to_rfc3339()),
                );
            }

            binding.junction.save(&mut link).await?;
            trace!(
                association = association.name(),
                junction = binding.junction.table_name(),
                "junction row saved"
            );
        }
        Ok(())
    }

    /// One query per target, unioned, then per-row deletes
    async fn delete_matching(
        &self,
        binding: &JunctionBinding,
        source: &Entity,
        targets: &[Entity],
    ) -> OrmResult<usize> {
        let association = &self.association;
        let junction = &binding.junction;
        let junction_alias = junction.alias();
        let target_table = association.target();

        let source_value = self.source_key_value(source)?;

        let mut matched: Vec<Row> = Vec::new();
        let mut seen = HashSet::new();
        for target in targets {
            let target_values = target
                .extract(target_table.primary_key())
                .ok_or_else(|| {
                    OrmError::UnpersistedEntity(format!(
                        "target entity of association \"{}\"",
                        association.name()
                    ))
                })?;

            let query = junction
                .find()
                .and_where(association.junction_conditions().to_vec())
                .where_eq(
                    &format!("{}.{}", junction_alias, binding.source_key),
                    source_value.clone(),
                )
                .where_eq(
                    &format!("{}.{}", junction_alias, binding.target_key),
                    target_values[0].clone(),
                );

            for row in junction.fetch_all(&query).await? {
                let key = row_identity(&row, junction.primary_key(), binding);
                if seen.insert(key) {
                    matched.push(row);
                }
            }
        }

        let deleted = matched.len();
        for row in matched {
            junction.delete(&Entity::from_row(row)).await?;
        }
        Ok(deleted)
    }

    /// Drop unlinked targets from the source's association property
    fn remove_from_property(&self, source: &mut Entity, targets: &[Entity]) {
        let property = self.association.property();
        let Some(Value::Array(current)) = source.get(&property).cloned() else {
            return;
        };

        let target_pk = self.association.target().primary_key();
        let removed: HashSet<String> = targets
            .iter()
            .filter_map(|target| target.extract(target_pk))
            .map(|values| index_key(&values.iter().collect::<Vec<_>>()))
            .collect();

        let kept: Vec<Value> = current
            .into_iter()
            .filter(|value| match value.as_object() {
                Some(row) => {
                    let mut values = Vec::new();
                    for column in target_pk {
                        match row.get(column) {
                            Some(v) if !v.is_null() => values.push(v),
                            _ => return true,
                        }
                    }
                    !removed.contains(&index_key(&values))
                }
                None => true,
            })
            .collect();

        source.set(&property, Value::Array(kept));
    }

    fn ensure_persisted(&self, entity: &Entity, table: &TableRef, role: &str) -> OrmResult<()> {
        if !entity.has_persisted_identity(table.primary_key()) {
            return Err(OrmError::UnpersistedEntity(format!(
                "{} entity of association \"{}\"",
                role,
                self.association.name()
            )));
        }
        Ok(())
    }

    fn source_key_value(&self, source: &Entity) -> OrmResult<Value> {
        let source_table = self.association.source();
        let values = source.extract(source_table.primary_key()).ok_or_else(|| {
            OrmError::MissingPrimaryKey(format!(
                "source entity of association \"{}\" has no resolvable primary key",
                self.association.name()
            ))
        })?;
        Ok(values[0].clone())
    }
}

/// Identity of a junction row: its primary key, or both link keys when the
/// junction declares none
fn row_identity(row: &Row, primary_key: &[String], binding: &JunctionBinding) -> String {
    let mut values = Vec::new();
    for column in primary_key {
        match row.get(column) {
            Some(value) if !value.is_null() => values.push(value),
            _ => {
                values.clear();
                break;
            }
        }
    }
    if values.is_empty() {
        for column in [&binding.source_key, &binding.target_key] {
            if let Some(value) = row.get(column) {
                values.push(value);
            }
        }
    }
    index_key(&values)
}

/// Entities rendered as the property value of their parent
fn entity_list(entities: &[Entity]) -> Value {
    Value::Array(
        entities
            .iter()
            .map(|entity| Value::Object(entity.to_row()))
            .collect(),
    )
}

fn single_key(columns: &[String], association: &str) -> OrmResult<String> {
    match columns {
        [column] => Ok(column.clone()),
        _ => Err(OrmError::InvalidConfiguration(format!(
            "Association \"{}\" needs single-column junction keys",
            association
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::StubTable;
    use super::*;
    use serde_json::json;

    fn tags_association() -> Association {
        let articles = StubTable::handle("articles", &["id"], &["id", "title"]);
        let tags = StubTable::handle("tags", &["id"], &["id", "name"]);
        let junction = StubTable::handle(
            "articles_tags",
            &["id"],
            &["id", "article_id", "tag_id"],
        );
        Association::many_to_many("Tags", articles, tags, junction)
    }

    #[test]
    fn test_new_rejects_non_junction_kinds() {
        let authors = StubTable::handle("authors", &["id"], &["id", "name"]);
        let articles = StubTable::handle("articles", &["id"], &["id", "author_id"]);
        let association = Association::has_many("Articles", authors, articles);
        assert!(JunctionManager::new(association).is_err());
    }

    #[test]
    fn test_junction_binds_reciprocal_associations() {
        let association = tags_association();
        let target = association.target().clone();
        let manager = JunctionManager::new(association).unwrap();

        let junction = manager.junction().unwrap().clone();
        assert_eq!(junction.table_name(), "articles_tags");

        // Both ends registered on the junction
        assert!(junction.association("Articles").is_some());
        assert!(junction.association("Tags").is_some());

        // Reciprocal traversal registered on the target
        let back = target.association("Articles").unwrap();
        assert_eq!(back.kind(), RelationKind::ManyToMany);
        assert_eq!(back.foreign_key(), ["tag_id"]);
        assert_eq!(back.target_foreign_key(), ["article_id"]);
        assert!(target.association("ArticlesTags").is_some());

        // Second access reuses the binding
        assert!(manager.junction().is_ok());
    }

    #[tokio::test]
    async fn test_link_rejects_unpersisted_source() {
        let manager = JunctionManager::new(tags_association()).unwrap();
        let mut source = Entity::new();
        source.set("id", json!(1));

        let err = manager.link(&mut source, &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::UnpersistedEntity(_)));
    }

    #[tokio::test]
    async fn test_link_rejects_unpersisted_target() {
        let manager = JunctionManager::new(tags_association()).unwrap();
        let mut source = Entity::new();
        source.set("id", json!(1));
        source.mark_persisted();

        let mut target = Entity::new();
        target.set("name", json!("rust"));

        let err = manager.link(&mut source, &[target]).await.unwrap_err();
        assert!(matches!(err, OrmError::UnpersistedEntity(_)));
    }

    #[tokio::test]
    async fn test_replace_links_requires_a_resolvable_primary_key() {
        let manager = JunctionManager::new(tags_association()).unwrap();
        // New entity without a key: distinct error from the persistence check
        let mut source = Entity::new();
        source.set("title", json!("First post"));

        let err = manager.replace_links(&mut source, &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::MissingPrimaryKey(_)));
    }

    #[tokio::test]
    async fn test_link_replaces_the_association_property() {
        let manager = JunctionManager::new(tags_association()).unwrap();
        let mut source = Entity::new();
        source.set("id", json!(1));
        source.mark_persisted();

        let mut tag = Entity::new();
        tag.set("id", json!(2));
        tag.set("name", json!("rust"));
        tag.mark_persisted();

        assert!(manager.link(&mut source, &[tag]).await.unwrap());
        let stored = source.get("tags").unwrap().as_array().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get("name"), Some(&json!("rust")));
    }
}
