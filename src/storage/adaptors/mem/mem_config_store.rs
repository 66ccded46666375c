use std::collections::BTreeMap;
use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use crate::storage::check_key_shape;
use crate::storage::next_index;
use crate::storage::own_backend_parts;
use crate::BackendKey;
use crate::ConfigStore;
use crate::DbKeyRow;
use crate::DependencyEdge;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Owner;
use crate::Ownership;
use crate::Result;
use crate::StorageError;
use crate::StoredRow;

type Table = BTreeMap<InstanceKey, StoredRow>;

/// In-memory metadata/value store
#[derive(Debug, Default)]
pub struct MemConfigStore {
    descriptors: RwLock<Vec<ObjectDescriptor>>,
    edges: RwLock<Vec<DependencyEdge>>,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(
        descriptors: Vec<ObjectDescriptor>,
        edges: Vec<DependencyEdge>,
    ) -> Self {
        Self {
            descriptors: RwLock::new(descriptors),
            edges: RwLock::new(edges),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn put_descriptor(
        &self,
        descriptor: ObjectDescriptor,
    ) {
        let mut descriptors = self.descriptors.write();
        descriptors.retain(|d| d.name != descriptor.name);
        descriptors.push(descriptor);
    }

    pub fn put_edge(
        &self,
        edge: DependencyEdge,
    ) {
        self.edges.write().push(edge);
    }

    /// Inserts a row with an explicit key, replacing any existing one.
    pub fn seed_row(
        &self,
        object: &ObjectDescriptor,
        key: InstanceKey,
        backend_key: BackendKey,
        ownership: Ownership,
        fields: FieldValues,
    ) {
        self.tables.write().entry(object.table.clone()).or_default().insert(
            key,
            StoredRow {
                backend_key,
                ownership,
                fields,
            },
        );
    }

    pub fn row(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Option<StoredRow> {
        self.tables.read().get(&object.table).and_then(|t| t.get(key)).cloned()
    }

    pub fn row_count(
        &self,
        object: &ObjectDescriptor,
    ) -> usize {
        self.tables.read().get(&object.table).map(BTreeMap::len).unwrap_or(0)
    }

    fn insert(
        tables: &mut HashMap<String, Table>,
        parent: Option<&ObjectDescriptor>,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<()> {
        if tables.get(&object.table).is_some_and(|t| t.contains_key(key)) {
            return Err(StorageError::DuplicateKey {
                object: object.name.clone(),
                key: key.to_string(),
            }
            .into());
        }

        let backend_key = backend_key.unwrap_or_else(|| {
            let prefix = parent
                .and_then(|p| tables.get(&p.table)?.get(&key.prefix(p.key_shape())))
                .map(|r| r.backend_key.clone())
                .unwrap_or_default();
            prefix.join(&own_backend_parts(object, key, fields))
        });

        debug!("insert row {}[{}] backend_key={}", object.name, key, backend_key);
        tables.entry(object.table.clone()).or_default().insert(
            key.clone(),
            StoredRow {
                backend_key,
                ownership,
                fields: fields.clone(),
            },
        );
        Ok(())
    }

    fn parent_descriptor(
        &self,
        object: &ObjectDescriptor,
    ) -> Option<ObjectDescriptor> {
        let parent = object.parent.as_ref()?;
        self.descriptors.read().iter().find(|d| &d.name == parent).cloned()
    }
}

impl ConfigStore for MemConfigStore {
    fn load_descriptors(&self) -> Result<Vec<ObjectDescriptor>> {
        Ok(self.descriptors.read().clone())
    }

    fn load_edges(&self) -> Result<Vec<DependencyEdge>> {
        Ok(self.edges.read().clone())
    }

    fn fetch_db_keys(
        &self,
        object: &ObjectDescriptor,
        scope: &InstanceKey,
    ) -> Result<Vec<DbKeyRow>> {
        let tables = self.tables.read();
        let Some(table) = tables.get(&object.table) else {
            return Ok(Vec::new());
        };
        let rows: Vec<DbKeyRow> = table
            .iter()
            .filter(|(k, _)| k.starts_with(scope))
            .map(|(k, row)| DbKeyRow::new(k.clone(), row.backend_key.clone(), row.ownership))
            .collect();
        trace!("fetch_db_keys {} scope {}: {} rows", object.name, scope, rows.len());
        Ok(rows)
    }

    fn field_values(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<Option<FieldValues>> {
        Ok(self.row(object, key).map(|r| r.fields))
    }

    fn allocate_row(
        &self,
        object: &ObjectDescriptor,
        parent_key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<InstanceKey> {
        let parent = self.parent_descriptor(object);
        let mut tables = self.tables.write();

        let key = if object.is_multi_instance() {
            let table = tables.get(&object.table);
            let index = next_index(object, parent_key, table.into_iter().flat_map(|t| t.keys()))?;
            parent_key.child(index)
        } else {
            InstanceKey::root()
        };

        Self::insert(&mut tables, parent.as_ref(), object, &key, backend_key, ownership, fields)?;
        Ok(key)
    }

    fn insert_row_at(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<()> {
        check_key_shape(object, key)?;
        let parent = self.parent_descriptor(object);
        let mut tables = self.tables.write();
        Self::insert(&mut tables, parent.as_ref(), object, key, backend_key, ownership, fields)
    }

    fn update_fields(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let row = tables
            .get_mut(&object.table)
            .and_then(|t| t.get_mut(key))
            .ok_or_else(|| StorageError::RowNotFound {
                object: object.name.clone(),
                key: key.to_string(),
            })?;
        row.fields.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn mark_user_configured(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let row = tables
            .get_mut(&object.table)
            .and_then(|t| t.get_mut(key))
            .ok_or_else(|| StorageError::RowNotFound {
                object: object.name.clone(),
                key: key.to_string(),
            })?;
        row.ownership.cfg_owner = Owner::User;
        Ok(())
    }

    fn delete_row(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<bool> {
        let removed = self
            .tables
            .write()
            .get_mut(&object.table)
            .map(|t| t.remove(key).is_some())
            .unwrap_or(false);
        debug!("delete_row {}[{}] removed={}", object.name, key, removed);
        Ok(removed)
    }
}
