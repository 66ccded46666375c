use std::collections::BTreeSet;
use std::fmt;

use crate::DependencyClass;
use crate::DependencyEdge;
use crate::Error;
use crate::InstanceKey;
use crate::ObjectDescriptor;

/// What a cascade did, complete or up to the point it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Dependent instances created, in creation order
    pub created: Vec<(String, InstanceKey)>,
    /// Instances deleted, deepest first
    pub deleted: Vec<(String, InstanceKey)>,
    /// Edges that failed validation and were ignored
    pub skipped_edges: Vec<String>,
    /// Number of times recursion stopped at the depth bound with edges left
    pub depth_limited: usize,
    /// Backends that need a restart for the changes to apply
    pub restart_backends: BTreeSet<String>,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Where a cascade failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureProvenance {
    pub depth: usize,
    /// Object whose edges were being processed
    pub object: String,
    pub key: InstanceKey,
    /// Edge being followed, `None` when the failing step was the level's
    /// own delete
    pub edge: Option<String>,
}

impl fmt::Display for FailureProvenance {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}[{}] at depth {}", self.object, self.key, self.depth)?;
        if let Some(edge) = &self.edge {
            write!(f, " via {edge}")?;
        }
        Ok(())
    }
}

/// First failure of a cascade together with the work already done.
///
/// Completed sibling branches are not rolled back; `partial` lists them.
#[derive(Debug, thiserror::Error)]
#[error("{class:?} cascade aborted at {failure}: {source}")]
pub struct CascadeAbort {
    pub class: DependencyClass,
    pub failure: FailureProvenance,
    pub partial: CascadeReport,
    pub source: Box<Error>,
}

#[derive(Debug, Default)]
struct LevelScratch {
    pending: Vec<InstanceKey>,
}

/// Working state of one cascade invocation.
#[derive(Debug)]
pub(crate) struct CascadeContext {
    pub(crate) max_depth: usize,
    levels: Vec<LevelScratch>,
    pub(crate) report: CascadeReport,
    failure: Option<FailureProvenance>,
}

impl CascadeContext {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            levels: (0..max_depth).map(|_| LevelScratch::default()).collect(),
            report: CascadeReport::default(),
            failure: None,
        }
    }

    /// Dependent keys collected at `depth`, waiting to be recursed into.
    pub(crate) fn pending(
        &mut self,
        depth: usize,
    ) -> &mut Vec<InstanceKey> {
        if depth >= self.levels.len() {
            self.levels.resize_with(depth + 1, LevelScratch::default);
        }
        &mut self.levels[depth].pending
    }

    pub(crate) fn take_pending(
        &mut self,
        depth: usize,
    ) -> Vec<InstanceKey> {
        let mut keys = std::mem::take(self.pending(depth));
        keys.sort();
        keys.dedup();
        keys
    }

    pub(crate) fn skip_edge(
        &mut self,
        edge: &DependencyEdge,
    ) {
        self.report.skipped_edges.push(edge.to_string());
    }

    /// Records the provenance of the first failure and passes `e` through.
    pub(crate) fn fail(
        &mut self,
        depth: usize,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        edge: Option<&DependencyEdge>,
        e: Error,
    ) -> Error {
        if self.failure.is_none() {
            self.failure = Some(FailureProvenance {
                depth,
                object: object.name.clone(),
                key: key.clone(),
                edge: edge.map(ToString::to_string),
            });
        }
        e
    }

    pub(crate) fn abort(
        mut self,
        class: DependencyClass,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        source: Error,
    ) -> Box<CascadeAbort> {
        let failure = self.failure.take().unwrap_or_else(|| FailureProvenance {
            depth: 0,
            object: object.name.clone(),
            key: key.clone(),
            edge: None,
        });
        Box::new(CascadeAbort {
            class,
            failure,
            partial: self.report,
            source: Box::new(source),
        })
    }
}
