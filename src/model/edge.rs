use std::fmt;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyClass {
    AutoCreate,
    AutoDelete,
}

/// `(parent_object, parent_param) -> (child_object, child_param)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub parent_object: String,
    pub parent_param: String,
    pub child_object: String,
    pub child_param: String,
    pub class: DependencyClass,
}

impl DependencyEdge {
    pub fn new(
        class: DependencyClass,
        parent: (&str, &str),
        child: (&str, &str),
    ) -> Self {
        Self {
            parent_object: parent.0.to_string(),
            parent_param: parent.1.to_string(),
            child_object: child.0.to_string(),
            child_param: child.1.to_string(),
            class,
        }
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{} ({:?})",
            self.parent_object, self.parent_param, self.child_object, self.child_param, self.class
        )
    }
}
