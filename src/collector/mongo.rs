//! Collectors streaming the MongoDB command-line tools.
//!
//! - `mongotop`: per-collection read/write time, one block per second
//! - `mongostat`: server counters, one row per second

use crate::collector::{Collector, CollectorError, CollectorKind, CollectorSpec};

/// Streams `mongotop` or `mongostat` output from a node.
#[derive(Debug, Clone)]
pub struct MongoToolCollector {
    spec: CollectorSpec,
}

impl MongoToolCollector {
    /// Build from a `MongoTop` or `MongoStat` spec.
    pub fn new(spec: CollectorSpec) -> Result<Self, CollectorError> {
        if !matches!(spec.kind, CollectorKind::MongoTop | CollectorKind::MongoStat) {
            return Err(CollectorError::InvalidField {
                collector: spec.name.clone(),
                field: "type",
                reason: format!("{} is not a mongo tool", spec.kind),
            });
        }
        spec.validate()?;
        Ok(Self { spec })
    }
}

impl Collector for MongoToolCollector {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn kind(&self) -> CollectorKind {
        self.spec.kind
    }

    fn command(&self) -> String {
        let mut command = self.spec.binary().to_string();
        if let Some(host) = self.spec.host.as_deref().filter(|h| !h.is_empty()) {
            command.push_str(&format!(" --host {host}"));
        }
        if let Some(port) = self.spec.port {
            command.push_str(&format!(" --port {port}"));
        }
        command
    }
}
