use std::fmt;

use super::Classification;
use crate::BackendKeyRow;
use crate::DbKeyRow;
use crate::ObjectDescriptor;
use crate::Owner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileAction {
    /// Store row the backend no longer has, and nobody wants kept
    DeleteFromDb,
    /// Backend instance the store does not know yet
    AddToDb,
    /// User-created store row missing on the backend
    AddToBackend,
    /// Push user configuration over the backend's copy
    UpdateBackend,
    Retain,
}

impl ReconcileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileAction::DeleteFromDb => "delete_from_db",
            ReconcileAction::AddToDb => "add_to_db",
            ReconcileAction::AddToBackend => "add_to_backend",
            ReconcileAction::UpdateBackend => "update_backend",
            ReconcileAction::Retain => "retain",
        }
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides what to do with one classified key-row, from ownership
/// provenance and the object's writability.
pub fn decide(
    object: &ObjectDescriptor,
    classification: &Classification,
) -> ReconcileAction {
    match classification {
        Classification::Matched(row) => {
            if row.ownership().touched_by_user() {
                ReconcileAction::UpdateBackend
            } else {
                ReconcileAction::Retain
            }
        }
        Classification::DbOnly(row) if !object.writable => match row.cfg_owner {
            Owner::System => ReconcileAction::DeleteFromDb,
            Owner::User => ReconcileAction::Retain,
        },
        Classification::DbOnly(row) => match (row.create_owner, row.cfg_owner) {
            (Owner::User, _) => ReconcileAction::AddToBackend,
            (Owner::System, Owner::System) => ReconcileAction::DeleteFromDb,
            (Owner::System, Owner::User) => ReconcileAction::Retain,
        },
        Classification::BackendOnly(_) => ReconcileAction::AddToDb,
    }
}

/// Key-rows bucketed by action, each bucket in backend-key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub delete_from_db: Vec<DbKeyRow>,
    pub add_to_db: Vec<BackendKeyRow>,
    pub add_to_backend: Vec<DbKeyRow>,
    pub update_backend: Vec<DbKeyRow>,
    pub retained: Vec<DbKeyRow>,
}

impl ReconcilePlan {
    pub fn build(
        object: &ObjectDescriptor,
        classifications: Vec<Classification>,
    ) -> Self {
        let mut plan = Self::default();
        for c in classifications {
            let action = decide(object, &c);
            match (action, c) {
                (ReconcileAction::AddToDb, Classification::BackendOnly(row)) => plan.add_to_db.push(row),
                (_, Classification::BackendOnly(_)) => {}
                (ReconcileAction::DeleteFromDb, Classification::Matched(row) | Classification::DbOnly(row)) => {
                    plan.delete_from_db.push(row)
                }
                (ReconcileAction::AddToBackend, Classification::Matched(row) | Classification::DbOnly(row)) => {
                    plan.add_to_backend.push(row)
                }
                (ReconcileAction::UpdateBackend, Classification::Matched(row) | Classification::DbOnly(row)) => {
                    plan.update_backend.push(row)
                }
                (_, Classification::Matched(row) | Classification::DbOnly(row)) => plan.retained.push(row),
            }
        }
        plan
    }

    pub fn action_count(&self) -> usize {
        self.delete_from_db.len() + self.add_to_db.len() + self.add_to_backend.len() + self.update_backend.len()
    }
}
