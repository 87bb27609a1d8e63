//! Collector definitions as they appear in the cluster config.

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, CollectorKind};

/// Immutable description of one collector.
///
/// Which optional fields matter depends on `kind`:
/// `host`/`port`/`path` for the mongo tools, `file` for tails, plus `grep`
/// for [`CollectorKind::TailGrep`]. `path` always overrides the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorSpec {
    /// Unique name; also the first segment of the datum path.
    pub name: String,
    /// Collector kind.
    #[serde(rename = "type")]
    pub kind: CollectorKind,
    /// `--host` passed to the mongo tool.
    #[serde(default)]
    pub host: Option<String>,
    /// `--port` passed to the mongo tool.
    #[serde(default)]
    pub port: Option<u16>,
    /// Binary path override.
    #[serde(default)]
    pub path: Option<String>,
    /// File followed by tail collectors.
    #[serde(default)]
    pub file: Option<String>,
    /// Filter pattern for grep-tail collectors.
    #[serde(default)]
    pub grep: Option<String>,
}

impl CollectorSpec {
    /// Create a spec with no optional parameters.
    pub fn new(name: impl Into<String>, kind: CollectorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            host: None,
            port: None,
            path: None,
            file: None,
            grep: None,
        }
    }

    /// Set the mongo `--host`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the mongo `--port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Override the binary path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the followed file.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set the grep pattern.
    pub fn with_grep(mut self, pattern: impl Into<String>) -> Self {
        self.grep = Some(pattern.into());
        self
    }

    /// Binary to invoke: the override if set, else the kind's default tool.
    pub fn binary(&self) -> &str {
        self.path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.kind.default_binary())
    }

    /// Check that the fields required by `kind` are present.
    pub fn validate(&self) -> Result<(), CollectorError> {
        let missing = |field| CollectorError::MissingField {
            collector: self.name.clone(),
            field,
        };
        match self.kind {
            CollectorKind::MongoTop | CollectorKind::MongoStat => {
                if self.port == Some(0) {
                    return Err(CollectorError::InvalidField {
                        collector: self.name.clone(),
                        field: "port",
                        reason: "must be non-zero".to_string(),
                    });
                }
            }
            CollectorKind::Tail => {
                non_blank(self.file.as_deref()).ok_or_else(|| missing("file"))?;
            }
            CollectorKind::TailGrep => {
                non_blank(self.file.as_deref()).ok_or_else(|| missing("file"))?;
                non_blank(self.grep.as_deref()).ok_or_else(|| missing("grep"))?;
            }
        }
        Ok(())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
