// -
// Database namespaces

/// Sled tree holding bincode-encoded object descriptors keyed by name
pub(crate) const OBJECT_DESCRIPTOR_TREE: &str = "_object_descriptors";
/// Sled tree holding bincode-encoded dependency edges in load order
pub(crate) const DEPENDENCY_EDGE_TREE: &str = "_dependency_edges";
/// Prefix of the per-object instance table trees
pub(crate) const TABLE_TREE_PREFIX: &str = "_table_";

// -
// Cascade bounds

/// Default cascade recursion depth
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 5;
/// Upper limit accepted from configuration
pub const MAX_CASCADE_DEPTH_LIMIT: usize = 16;

// -
// Environment

/// Prefix of environment variable overrides, e.g. `CFGMGR__ADMISSION__WORKER_COUNT`
pub(crate) const ENV_PREFIX: &str = "CFGMGR";

// -
// Requests

/// Caller id of requests the daemon submits itself, e.g. periodic discover
pub const INTERNAL_CALLER_ID: u32 = 0;
