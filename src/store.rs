//! Store Layer
//!
//! In-memory hierarchical key/value store shared by every polling thread:
//! - **Paths**: dotted addresses into a tree of mappings
//! - **Sequences**: capped histories, oldest entries evicted on push
//! - **Locking**: one reentrant lock around the whole tree
//!
//! # Components
//!
//! - [`ClusterStore`]: Get / Set / Push over dotted paths
//! - [`StoreReader`]: read-only handle given to display layers
//! - [`DottedPath`] / [`IntoPath`]: path parsing and construction
//! - [`StoreValue`] / [`Scalar`] / [`Datum`]: tree values
//! - [`StoreError`]: lookup and shape errors

mod cluster_store;
mod error;
mod path;
mod reader;
mod types;

pub use cluster_store::ClusterStore;
pub use error::StoreError;
pub use path::{DottedPath, IntoPath};
pub use reader::StoreReader;
pub use types::{Datum, Scalar, StoreValue};

/// Number of datums retained per `<collector>.<node>` sequence.
pub const DATUM_RETENTION: usize = 500;

/// Top-level key holding per-worker success timestamps.
pub const LATEST_KEY: &str = "latest";

/// Leaf key holding a node's primary flag.
pub const PRIMARY_KEY: &str = "primary";

/// `<collector>.<node>`: where a collector's datums for a node live.
pub fn datum_path(collector: &str, node: &str) -> Result<DottedPath, StoreError> {
    DottedPath::from_segments([collector, node])
}

/// `latest.<node>.<collector>`: last successful batch time for a worker.
pub fn latest_path(node: &str, collector: &str) -> Result<DottedPath, StoreError> {
    DottedPath::from_segments([LATEST_KEY, node, collector])
}

/// `<node>.primary`: role flag written by the identity probe.
pub fn primary_path(node: &str) -> Result<DottedPath, StoreError> {
    DottedPath::from_segments([node, PRIMARY_KEY])
}
