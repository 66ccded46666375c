use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Provenance of an instance's existence or of its configured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    System,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub create_owner: Owner,
    pub cfg_owner: Owner,
}

impl Ownership {
    pub const fn system() -> Self {
        Self {
            create_owner: Owner::System,
            cfg_owner: Owner::System,
        }
    }

    pub const fn user() -> Self {
        Self {
            create_owner: Owner::User,
            cfg_owner: Owner::User,
        }
    }

    /// Any user involvement, in existence or in configuration.
    pub fn touched_by_user(&self) -> bool {
        self.create_owner == Owner::User || self.cfg_owner == Owner::User
    }
}

/// Ordered integer indices identifying one instance.
///
/// The empty key addresses the single instance of a scalar object and is
/// also used as the "whole table" scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey(pub Vec<u32>);

impl InstanceKey {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// The leading `len` components.
    pub fn prefix(
        &self,
        len: usize,
    ) -> InstanceKey {
        InstanceKey(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn starts_with(
        &self,
        scope: &InstanceKey,
    ) -> bool {
        self.0.starts_with(&scope.0)
    }

    pub fn child(
        &self,
        index: u32,
    ) -> InstanceKey {
        let mut components = self.0.clone();
        components.push(index);
        InstanceKey(components)
    }

    /// Big-endian encoding so byte order equals key order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|c| c.to_be_bytes()).collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(InstanceKey(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ))
    }
}

impl From<Vec<u32>> for InstanceKey {
    fn from(v: Vec<u32>) -> Self {
        InstanceKey(v)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("-");
        }
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Backend-facing identity of an instance; the namespace of record when
/// matching store rows against backend rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BackendKey(pub Vec<String>);

impl BackendKey {
    pub fn new<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        BackendKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_prefix_of(
        &self,
        other: &BackendKey,
    ) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn join(
        &self,
        tail: &[String],
    ) -> BackendKey {
        let mut parts = self.0.clone();
        parts.extend_from_slice(tail);
        BackendKey(parts)
    }
}

impl fmt::Display for BackendKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// One instance as recorded in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbKeyRow {
    pub key: InstanceKey,
    pub backend_key: BackendKey,
    pub create_owner: Owner,
    pub cfg_owner: Owner,
}

impl DbKeyRow {
    pub fn new(
        key: InstanceKey,
        backend_key: BackendKey,
        ownership: Ownership,
    ) -> Self {
        Self {
            key,
            backend_key,
            create_owner: ownership.create_owner,
            cfg_owner: ownership.cfg_owner,
        }
    }

    pub fn ownership(&self) -> Ownership {
        Ownership {
            create_owner: self.create_owner,
            cfg_owner: self.cfg_owner,
        }
    }
}

/// One instance as reported by a backend. Backends know nothing about
/// provenance, so there are no ownership tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendKeyRow {
    pub backend_key: BackendKey,
}

impl BackendKeyRow {
    pub fn new(backend_key: BackendKey) -> Self {
        Self { backend_key }
    }
}
