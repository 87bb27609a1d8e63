//! Core collector traits and types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::store::{self, ClusterStore, Datum, StoreError};

/// Errors raised while building a collector from its spec.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A field the collector kind needs was not supplied.
    #[error("collector '{collector}': missing required field '{field}'")]
    MissingField {
        collector: String,
        field: &'static str,
    },

    /// A field was supplied but is unusable.
    #[error("collector '{collector}': invalid {field}: {reason}")]
    InvalidField {
        collector: String,
        field: &'static str,
        reason: String,
    },
}

/// Closed set of collector kinds.
///
/// Names match the `type` field in the cluster config.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum CollectorKind {
    /// `mongotop` stream.
    MongoTop,
    /// `mongostat` stream.
    MongoStat,
    /// Follow a log file.
    Tail,
    /// Follow a log file through a `grep` filter.
    TailGrep,
}

impl CollectorKind {
    /// Whether output arrives on an irregular cadence.
    ///
    /// Infrequent collectors are exempt from staleness-based health checks.
    pub fn is_infrequent(self) -> bool {
        matches!(self, Self::Tail | Self::TailGrep)
    }

    /// Tool invoked when no binary path override is configured.
    pub fn default_binary(self) -> &'static str {
        match self {
            Self::MongoTop => "mongotop",
            Self::MongoStat => "mongostat",
            Self::Tail | Self::TailGrep => "tail",
        }
    }
}

/// A remote monitoring job: what to run and how to record its output.
///
/// Implementations only describe the command; the poll worker owns the
/// remote session and feeds output back through [`Collector::process`].
pub trait Collector: Send + Sync + 'static {
    /// Collector instance name (unique per cluster config).
    fn name(&self) -> &str;

    /// Collector kind.
    fn kind(&self) -> CollectorKind;

    /// Full remote command line, ready for a remote shell.
    fn command(&self) -> String;

    /// Exempt from staleness-based health penalties.
    fn infrequent(&self) -> bool {
        self.kind().is_infrequent()
    }

    /// Record a batch of output lines produced on `node`.
    ///
    /// Each line becomes a [`Datum`] pushed in order onto
    /// `<collector>.<node>`, keeping the most recent
    /// [`store::DATUM_RETENTION`] entries. Returns the number of datums
    /// written.
    fn process(
        &self,
        node: &str,
        lines: &[String],
        store: &ClusterStore,
    ) -> Result<usize, StoreError> {
        let path = store::datum_path(self.name(), node)?;
        let mut written = 0;
        for line in lines {
            let payload = line.trim_end_matches(['\r', '\n']);
            let datum = Datum::new(payload, node, self.name(), self.kind());
            store.push(&path, datum, Some(store::DATUM_RETENTION))?;
            written += 1;
        }
        Ok(written)
    }
}
