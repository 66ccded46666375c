use std::sync::Arc;

use crate::DependencyEdge;
use crate::MetadataCatalog;
use crate::ObjectDescriptor;

/// Why an edge cannot be followed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EdgeRejection {
    #[error("parent {object} has no parameter {param}")]
    MissingParentParam { object: String, param: String },

    #[error("child object {0} is not in the catalog")]
    UnknownChild(String),

    #[error("child {object} has no parameter {param}")]
    MissingChildParam { object: String, param: String },

    #[error("child {0} is read-only")]
    ChildReadOnly(String),

    #[error("child key shape {child} does not extend parent key shape {parent}")]
    KeyShapeMismatch { parent: usize, child: usize },
}

/// Resolves the child of `edge` if the edge may be followed from `parent`.
///
/// The child must extend the parent's key by exactly one index, or be keyed
/// by the child parameter alone.
pub fn validate_edge(
    catalog: &MetadataCatalog,
    parent: &ObjectDescriptor,
    edge: &DependencyEdge,
) -> Result<Arc<ObjectDescriptor>, EdgeRejection> {
    if !parent.has_param(&edge.parent_param) {
        return Err(EdgeRejection::MissingParentParam {
            object: parent.name.clone(),
            param: edge.parent_param.clone(),
        });
    }

    let child = catalog
        .descriptor(&edge.child_object)
        .ok_or_else(|| EdgeRejection::UnknownChild(edge.child_object.clone()))?;

    if !child.has_param(&edge.child_param) {
        return Err(EdgeRejection::MissingChildParam {
            object: child.name.clone(),
            param: edge.child_param.clone(),
        });
    }

    if !child.writable {
        return Err(EdgeRejection::ChildReadOnly(child.name.clone()));
    }

    let extends_parent = child.key_shape() == parent.key_shape() + 1;
    let keyed_by_child_param = child.index_params.len() == 1 && child.index_params[0] == edge.child_param;
    if !extends_parent && !keyed_by_child_param {
        return Err(EdgeRejection::KeyShapeMismatch {
            parent: parent.key_shape(),
            child: child.key_shape(),
        });
    }

    Ok(child)
}
