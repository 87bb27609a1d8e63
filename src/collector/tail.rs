//! Collectors following a log file on the node.
//!
//! Output cadence depends on the log, so both kinds are infrequent.

use crate::collector::spec::non_blank;
use crate::collector::{Collector, CollectorError, CollectorKind, CollectorSpec};

/// Follows a file with `tail -F`, optionally filtered through `grep`.
#[derive(Debug, Clone)]
pub struct TailCollector {
    spec: CollectorSpec,
    file: String,
    pattern: Option<String>,
}

impl TailCollector {
    /// Build from a `Tail` or `TailGrep` spec.
    pub fn new(spec: CollectorSpec) -> Result<Self, CollectorError> {
        spec.validate()?;
        let missing = |field| CollectorError::MissingField {
            collector: spec.name.clone(),
            field,
        };
        let file = non_blank(spec.file.as_deref())
            .ok_or_else(|| missing("file"))?
            .to_string();
        let pattern = match spec.kind {
            CollectorKind::Tail => None,
            CollectorKind::TailGrep => Some(
                non_blank(spec.grep.as_deref())
                    .ok_or_else(|| missing("grep"))?
                    .to_string(),
            ),
            other => {
                return Err(CollectorError::InvalidField {
                    collector: spec.name.clone(),
                    field: "type",
                    reason: format!("{other} is not a tail collector"),
                });
            }
        };
        Ok(Self {
            spec,
            file,
            pattern,
        })
    }
}

impl Collector for TailCollector {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn kind(&self) -> CollectorKind {
        self.spec.kind
    }

    fn command(&self) -> String {
        let follow = format!("{} -n 0 -F {}", self.spec.binary(), shell_quote(&self.file));
        match &self.pattern {
            Some(pattern) => format!("{follow} | grep --line-buffered {}", shell_quote(pattern)),
            None => follow,
        }
    }
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_command() {
        let spec = CollectorSpec::new("log", CollectorKind::Tail).with_file("/var/log/mongod.log");
        let tail = TailCollector::new(spec).unwrap();
        assert_eq!(tail.command(), "tail -n 0 -F '/var/log/mongod.log'");
        assert!(tail.infrequent());
    }

    #[test]
    fn test_tail_grep_command() {
        let spec = CollectorSpec::new("slow", CollectorKind::TailGrep)
            .with_file("/var/log/mongod.log")
            .with_grep("it's slow");
        let tail = TailCollector::new(spec).unwrap();
        assert_eq!(
            tail.command(),
            r"tail -n 0 -F '/var/log/mongod.log' | grep --line-buffered 'it'\''s slow'"
        );
        assert!(tail.infrequent());
    }

    #[test]
    fn test_binary_override() {
        let spec = CollectorSpec::new("log", CollectorKind::Tail)
            .with_file("/x.log")
            .with_path("/usr/bin/tail");
        let tail = TailCollector::new(spec).unwrap();
        assert_eq!(tail.command(), "/usr/bin/tail -n 0 -F '/x.log'");
    }

    #[test]
    fn test_missing_fields() {
        assert!(TailCollector::new(CollectorSpec::new("log", CollectorKind::Tail)).is_err());
        let spec = CollectorSpec::new("slow", CollectorKind::TailGrep).with_file("/x.log");
        assert!(TailCollector::new(spec).is_err());
        let spec = CollectorSpec::new("top", CollectorKind::MongoTop).with_file("/x.log");
        assert!(TailCollector::new(spec).is_err());
    }
}
