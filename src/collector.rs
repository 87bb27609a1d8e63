//! Collector Layer
//!
//! A collector describes one remote monitoring command and how its output
//! lines are recorded. Collectors hold no connection of their own: each
//! (node, collector) pair gets a [`PollWorker`](crate::worker::PollWorker)
//! that runs [`Collector::command`] and feeds output to
//! [`Collector::process`].
//!
//! # Kinds
//!
//! - [`CollectorKind::MongoTop`] / [`CollectorKind::MongoStat`]: [`MongoToolCollector`]
//! - [`CollectorKind::Tail`] / [`CollectorKind::TailGrep`]: [`TailCollector`]
//!
//! The set is closed: adding a kind means adding a variant and a case in
//! [`build`].
//!
//! # Example
//!
//! ```rust
//! use mongo_commander::collector::{self, CollectorKind, CollectorSpec};
//!
//! let spec = CollectorSpec::new("top", CollectorKind::MongoTop).with_port(27017);
//! let collector = collector::build(&spec).unwrap();
//! assert_eq!(collector.command(), "mongotop --port 27017");
//! ```

mod mongo;
mod spec;
mod tail;
mod traits;

use std::sync::Arc;

pub use mongo::MongoToolCollector;
pub use spec::CollectorSpec;
pub use tail::TailCollector;
pub use traits::{Collector, CollectorError, CollectorKind};

/// Construct the collector for `spec`.
///
/// # Errors
/// Returns `CollectorError` if a field required by the kind is missing.
pub fn build(spec: &CollectorSpec) -> Result<Arc<dyn Collector>, CollectorError> {
    let collector: Arc<dyn Collector> = match spec.kind {
        CollectorKind::MongoTop | CollectorKind::MongoStat => {
            Arc::new(MongoToolCollector::new(spec.clone())?)
        }
        CollectorKind::Tail | CollectorKind::TailGrep => Arc::new(TailCollector::new(spec.clone())?),
    };
    Ok(collector)
}
