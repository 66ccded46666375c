use std::cmp::Ordering;

use tracing::warn;

use crate::BackendKey;
use crate::BackendKeyRow;
use crate::DbKeyRow;

/// Where a backend key was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Matched(DbKeyRow),
    DbOnly(DbKeyRow),
    BackendOnly(BackendKeyRow),
}

impl Classification {
    pub fn backend_key(&self) -> &BackendKey {
        match self {
            Classification::Matched(row) | Classification::DbOnly(row) => &row.backend_key,
            Classification::BackendOnly(row) => &row.backend_key,
        }
    }
}

fn sort_dedup<T>(
    object: &str,
    side: &str,
    mut rows: Vec<T>,
    key: impl Fn(&T) -> &BackendKey,
) -> Vec<T> {
    rows.sort_by(|a, b| key(a).cmp(key(b)));
    rows.dedup_by(|later, kept| {
        let duplicate = key(later) == key(kept);
        if duplicate {
            warn!("{}: dropping duplicate {} backend key {}", object, side, key(later));
        }
        duplicate
    });
    rows
}

/// Store rows ordered by backend key, first of each duplicate kept.
pub fn prepare_db_rows(
    object: &str,
    rows: Vec<DbKeyRow>,
) -> Vec<DbKeyRow> {
    sort_dedup(object, "store", rows, |r| &r.backend_key)
}

/// Backend rows ordered by backend key, first of each duplicate kept.
pub fn prepare_backend_rows(
    object: &str,
    rows: Vec<BackendKeyRow>,
) -> Vec<BackendKeyRow> {
    sort_dedup(object, "backend", rows, |r| &r.backend_key)
}

/// Sorted merge of both sides. Inputs must come from the `prepare_*`
/// functions: sorted and free of duplicates.
pub fn merge_walk(
    db: &[DbKeyRow],
    be: &[BackendKeyRow],
) -> Vec<Classification> {
    let mut out = Vec::with_capacity(db.len().max(be.len()));
    let (mut i, mut j) = (0, 0);

    while i < db.len() && j < be.len() {
        match db[i].backend_key.cmp(&be[j].backend_key) {
            Ordering::Equal => {
                out.push(Classification::Matched(db[i].clone()));
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(Classification::DbOnly(db[i].clone()));
                i += 1;
            }
            Ordering::Greater => {
                out.push(Classification::BackendOnly(be[j].clone()));
                j += 1;
            }
        }
    }
    out.extend(db[i..].iter().cloned().map(Classification::DbOnly));
    out.extend(be[j..].iter().cloned().map(Classification::BackendOnly));
    out
}
