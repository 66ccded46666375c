use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::FieldValues;

/// Mechanism used to carry out one verb for an object.
///
/// The set is closed: every descriptor picks one variant per verb and the
/// [`OperationRouter`](crate::OperationRouter) maps the variant to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpStyle {
    /// Write straight into the local value store
    Store,
    /// Config-file tooling
    ConfigTool,
    /// RPC bus call
    RpcBus,
    /// Shell script invocation
    Script,
    /// Backend-protocol message
    BackendProtocol,
}

impl fmt::Display for OpStyle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            OpStyle::Store => "store",
            OpStyle::ConfigTool => "config-tool",
            OpStyle::RpcBus => "rpc-bus",
            OpStyle::Script => "script",
            OpStyle::BackendProtocol => "backend-protocol",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbStyles {
    pub get: OpStyle,
    pub set: OpStyle,
    pub add: OpStyle,
    pub delete: OpStyle,
}

impl VerbStyles {
    pub fn uniform(style: OpStyle) -> Self {
        Self {
            get: style,
            set: style,
            add: style,
            delete: style,
        }
    }
}

impl Default for VerbStyles {
    fn default() -> Self {
        Self::uniform(OpStyle::Store)
    }
}

/// Metadata describing one configuration object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Dotted object path, e.g. `Device.IP.Interface`
    pub name: String,
    /// Ordered index parameter names; their count is the key shape
    pub index_params: Vec<String>,
    /// Every parameter of the object, index parameters included
    pub params: Vec<String>,
    /// Backing instance table
    pub table: String,
    pub styles: VerbStyles,
    pub writable: bool,
    pub configurable: bool,
    /// Backend process owning the live state
    pub backend: String,
    /// Enclosing multi-instance object for nested objects
    #[serde(default)]
    pub parent: Option<String>,
    /// Fields whose values form this object's part of the backend key
    #[serde(default)]
    pub backend_key_params: Vec<String>,
    /// Values applied to newly created instances
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl ObjectDescriptor {
    pub fn new(
        name: impl Into<String>,
        index_params: &[&str],
    ) -> Self {
        let name = name.into();
        let index_params: Vec<String> = index_params.iter().map(|p| p.to_string()).collect();
        Self {
            table: name.replace('.', "_"),
            params: index_params.clone(),
            index_params,
            name,
            styles: VerbStyles::default(),
            writable: true,
            configurable: true,
            backend: "store".to_string(),
            parent: None,
            backend_key_params: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_params(
        mut self,
        params: &[&str],
    ) -> Self {
        for p in params {
            if !self.has_param(p) {
                self.params.push(p.to_string());
            }
        }
        self
    }

    pub fn with_parent(
        mut self,
        parent: impl Into<String>,
    ) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_backend(
        mut self,
        backend: impl Into<String>,
        styles: VerbStyles,
    ) -> Self {
        self.backend = backend.into();
        self.styles = styles;
        self
    }

    pub fn with_backend_key(
        mut self,
        params: &[&str],
    ) -> Self {
        self.backend_key_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_default(
        mut self,
        param: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.defaults.insert(param.into(), value.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    #[inline]
    pub fn key_shape(&self) -> usize {
        self.index_params.len()
    }

    #[inline]
    pub fn is_multi_instance(&self) -> bool {
        !self.index_params.is_empty()
    }

    pub fn has_param(
        &self,
        name: &str,
    ) -> bool {
        self.params.iter().any(|p| p == name) || self.index_position(name).is_some()
    }

    pub fn index_position(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.index_params.iter().position(|p| p == name)
    }

    /// Defaults overlaid with the supplied values.
    pub fn fields_with_defaults(
        &self,
        supplied: &FieldValues,
    ) -> FieldValues {
        let mut fields = self.defaults.clone();
        fields.extend(supplied.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields
    }
}
