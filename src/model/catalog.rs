use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use tracing::warn;

use super::DependencyClass;
use super::DependencyEdge;
use super::ObjectDescriptor;
use crate::ConfigStore;
use crate::Result;

/// Read-only object model, loaded once at process start.
///
/// Descriptors and dependency edges never change after loading, so the
/// catalog is shared as a plain `Arc` without any locking.
#[derive(Debug, Default)]
pub struct MetadataCatalog {
    objects: HashMap<String, Arc<ObjectDescriptor>>,
    create_edges: HashMap<String, Vec<DependencyEdge>>,
    delete_edges: HashMap<String, Vec<DependencyEdge>>,
}

impl MetadataCatalog {
    pub fn new(
        descriptors: Vec<ObjectDescriptor>,
        edges: Vec<DependencyEdge>,
    ) -> Self {
        let mut objects = HashMap::with_capacity(descriptors.len());
        for d in descriptors {
            if let Some(prev) = objects.insert(d.name.clone(), Arc::new(d)) {
                warn!("duplicate descriptor for {}, keeping the last one", prev.name);
            }
        }

        let mut create_edges: HashMap<String, Vec<DependencyEdge>> = HashMap::new();
        let mut delete_edges: HashMap<String, Vec<DependencyEdge>> = HashMap::new();
        for edge in edges {
            let bucket = match edge.class {
                DependencyClass::AutoCreate => &mut create_edges,
                DependencyClass::AutoDelete => &mut delete_edges,
            };
            bucket.entry(edge.parent_object.clone()).or_default().push(edge);
        }

        Self {
            objects,
            create_edges,
            delete_edges,
        }
    }

    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        let descriptors = store.load_descriptors()?;
        let edges = store.load_edges()?;
        info!(
            "metadata catalog loaded: {} objects, {} dependency edges",
            descriptors.len(),
            edges.len()
        );
        Ok(Self::new(descriptors, edges))
    }

    pub fn descriptor(
        &self,
        name: &str,
    ) -> Option<Arc<ObjectDescriptor>> {
        self.objects.get(name).cloned()
    }

    /// Edges of `class` whose parent is `object`, in load order.
    pub fn edges(
        &self,
        object: &str,
        class: DependencyClass,
    ) -> &[DependencyEdge] {
        let bucket = match class {
            DependencyClass::AutoCreate => &self.create_edges,
            DependencyClass::AutoDelete => &self.delete_edges,
        };
        bucket.get(object).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All descriptors, parents before nested children.
    pub fn objects(&self) -> Vec<Arc<ObjectDescriptor>> {
        let mut all: Vec<_> = self.objects.values().cloned().collect();
        all.sort_by(|a, b| a.key_shape().cmp(&b.key_shape()).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
