use sled::Tree;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use crate::constants::DEPENDENCY_EDGE_TREE;
use crate::constants::OBJECT_DESCRIPTOR_TREE;
use crate::constants::TABLE_TREE_PREFIX;
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

/// Sled-backed metadata/value store.
///
/// Descriptors and edges live in dedicated trees; every object table is a
/// tree keyed by the big-endian instance key so that prefix scans return
/// the rows under one parent in key order.
pub struct SledConfigStore {
    db: sled::Db,
    descriptors: Tree,
    edges: Tree,
}

impl SledConfigStore {
    pub fn new(db: sled::Db) -> Result<Self> {
        let descriptors = db.open_tree(OBJECT_DESCRIPTOR_TREE).map_err(StorageError::from)?;
        let edges = db.open_tree(DEPENDENCY_EDGE_TREE).map_err(StorageError::from)?;
        Ok(Self {
            db,
            descriptors,
            edges,
        })
    }

    pub fn put_descriptor(
        &self,
        descriptor: &ObjectDescriptor,
    ) -> Result<()> {
        let value = bincode::serialize(descriptor).map_err(StorageError::from)?;
        self.descriptors
            .insert(descriptor.name.as_bytes(), value)
            .map_err(StorageError::from)?;
        Ok(())
    }

    pub fn put_edge(
        &self,
        edge: &DependencyEdge,
    ) -> Result<()> {
        let id = self.db.generate_id().map_err(StorageError::from)?;
        let value = bincode::serialize(edge).map_err(StorageError::from)?;
        self.edges.insert(id.to_be_bytes(), value).map_err(StorageError::from)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(StorageError::from)?;
        Ok(())
    }

    fn table(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Tree> {
        let name = format!("{TABLE_TREE_PREFIX}{}", object.table);
        Ok(self.db.open_tree(name).map_err(StorageError::from)?)
    }

    fn read_row(
        tree: &Tree,
        key: &InstanceKey,
    ) -> Result<Option<StoredRow>> {
        match tree.get(key.to_bytes()).map_err(StorageError::from)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }

    fn write_row(
        tree: &Tree,
        key: &InstanceKey,
        row: &StoredRow,
    ) -> Result<()> {
        let value = bincode::serialize(row).map_err(StorageError::from)?;
        tree.insert(key.to_bytes(), value).map_err(StorageError::from)?;
        Ok(())
    }

    fn modify_row(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        f: impl FnOnce(&mut StoredRow),
    ) -> Result<()> {
        let tree = self.table(object)?;
        let mut row = Self::read_row(&tree, key)?.ok_or_else(|| StorageError::RowNotFound {
            object: object.name.clone(),
            key: key.to_string(),
        })?;
        f(&mut row);
        Self::write_row(&tree, key, &row)
    }

    fn insert(
        &self,
        tree: &Tree,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<()> {
        if tree.contains_key(key.to_bytes()).map_err(StorageError::from)? {
            return Err(StorageError::DuplicateKey {
                object: object.name.clone(),
                key: key.to_string(),
            }
            .into());
        }

        let backend_key = match backend_key {
            Some(bk) => bk,
            None => {
                let prefix = match self.parent_descriptor(object)? {
                    Some(parent) => {
                        let parent_tree = self.table(&parent)?;
                        Self::read_row(&parent_tree, &key.prefix(parent.key_shape()))?
                            .map(|r| r.backend_key)
                            .unwrap_or_default()
                    }
                    None => BackendKey::default(),
                };
                prefix.join(&own_backend_parts(object, key, fields))
            }
        };

        debug!("insert row {}[{}] backend_key={}", object.name, key, backend_key);
        Self::write_row(
            tree,
            key,
            &StoredRow {
                backend_key,
                ownership,
                fields: fields.clone(),
            },
        )
    }

    fn parent_descriptor(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Option<ObjectDescriptor>> {
        let Some(parent) = &object.parent else {
            return Ok(None);
        };
        match self.descriptors.get(parent.as_bytes()).map_err(StorageError::from)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }
}

impl ConfigStore for SledConfigStore {
    fn load_descriptors(&self) -> Result<Vec<ObjectDescriptor>> {
        let mut out = Vec::new();
        for item in self.descriptors.iter() {
            let (_, value) = item.map_err(StorageError::from)?;
            out.push(bincode::deserialize(&value).map_err(StorageError::from)?);
        }
        Ok(out)
    }

    fn load_edges(&self) -> Result<Vec<DependencyEdge>> {
        let mut out = Vec::new();
        for item in self.edges.iter() {
            let (_, value) = item.map_err(StorageError::from)?;
            out.push(bincode::deserialize(&value).map_err(StorageError::from)?);
        }
        Ok(out)
    }

    #[instrument(skip(self, object), fields(object = %object.name))]
    fn fetch_db_keys(
        &self,
        object: &ObjectDescriptor,
        scope: &InstanceKey,
    ) -> Result<Vec<DbKeyRow>> {
        let tree = self.table(object)?;
        let mut rows = Vec::new();
        for item in tree.scan_prefix(scope.to_bytes()) {
            let (key, value) = item.map_err(StorageError::from)?;
            let key = InstanceKey::from_bytes(&key).ok_or_else(|| StorageError::CorruptKey {
                table: object.table.clone(),
            })?;
            let row: StoredRow = bincode::deserialize(&value).map_err(StorageError::from)?;
            rows.push(DbKeyRow::new(key, row.backend_key, row.ownership));
        }
        trace!("fetch_db_keys scope {}: {} rows", scope, rows.len());
        Ok(rows)
    }

    fn field_values(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<Option<FieldValues>> {
        let tree = self.table(object)?;
        Ok(Self::read_row(&tree, key)?.map(|r| r.fields))
    }

    fn allocate_row(
        &self,
        object: &ObjectDescriptor,
        parent_key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<InstanceKey> {
        let tree = self.table(object)?;

        let key = if object.is_multi_instance() {
            let mut existing = Vec::new();
            for item in tree.scan_prefix(parent_key.to_bytes()) {
                let (k, _) = item.map_err(StorageError::from)?;
                if let Some(k) = InstanceKey::from_bytes(&k) {
                    existing.push(k);
                }
            }
            parent_key.child(next_index(object, parent_key, existing.iter())?)
        } else {
            InstanceKey::root()
        };

        self.insert(&tree, object, &key, backend_key, ownership, fields)?;
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
        let tree = self.table(object)?;
        self.insert(&tree, object, key, backend_key, ownership, fields)
    }

    fn update_fields(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<()> {
        self.modify_row(object, key, |row| {
            row.fields.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        })
    }

    fn mark_user_configured(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<()> {
        self.modify_row(object, key, |row| row.ownership.cfg_owner = Owner::User)
    }

    fn delete_row(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<bool> {
        let tree = self.table(object)?;
        let removed = tree.remove(key.to_bytes()).map_err(StorageError::from)?.is_some();
        debug!("delete_row {}[{}] removed={}", object.name, key, removed);
        Ok(removed)
    }
}
