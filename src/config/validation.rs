//! Config errors and value expansion helpers.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Cluster configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file missing or unreadable.
    #[error("cannot read cluster config: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file is not valid YAML for the cluster schema.
    #[error("malformed cluster config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Config parsed but describes an unusable topology.
    #[error("invalid cluster config: {0}")]
    ValidationError(String),
}

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<fallback>[^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Parse a non-zero humantime duration such as `500ms`, `5s` or `1m30s`.
///
/// Used as a clap value parser.
///
/// # Examples
///
/// ```
/// use mongo_commander::config::parse_duration;
///
/// assert_eq!(parse_duration("60s").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// assert!(parse_duration("0s").is_err());
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let duration = match s.trim() {
        "" => return Err("empty duration".to_string()),
        text => humantime::parse_duration(text).map_err(|e| format!("{text:?}: {e}"))?,
    };
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

/// Substitute `${NAME}` and `${NAME:-fallback}` from the environment.
///
/// Unset variables without a fallback become empty.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps["name"]).unwrap_or_else(|_| {
                caps.name("fallback")
                    .map_or_else(String::new, |m| m.as_str().to_string())
            })
        })
        .into_owned()
}

/// Expand environment references, then a leading `~` to `$HOME`.
pub fn expand_path(input: &str) -> String {
    let expanded = expand_env_vars(input);
    match expanded.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match std::env::var("HOME") {
            Ok(home) => format!("{home}{rest}"),
            Err(_) => expanded,
        },
        _ => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_durations() {
        assert_eq!(parse_duration("5ms").unwrap(), Duration::from_millis(5));
        assert_eq!(parse_duration(" 1s ").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("2m 30s").unwrap(), Duration::from_secs(150));
    }

    #[test]
    fn test_rejected_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("60").is_err());
        assert!(parse_duration("0ms").is_err());
    }

    #[test]
    fn test_key_path_fallback() {
        let path = expand_env_vars("${MC_UNSET_KEY_DIR_31337:-/etc/mongo-keys}/id_ed25519");
        assert_eq!(path, "/etc/mongo-keys/id_ed25519");
        assert_eq!(expand_env_vars("${MC_UNSET_KEY_DIR_31337}/id"), "/id");
        assert_eq!(expand_env_vars("/keys/id_rsa"), "/keys/id_rsa");
    }

    #[test]
    fn test_expand_path_home() {
        let Ok(home) = std::env::var("HOME") else {
            return;
        };
        assert_eq!(expand_path("~/.ssh/id_rsa"), format!("{home}/.ssh/id_rsa"));
        assert_eq!(expand_path("~"), home);
        // Only a bare leading tilde is expanded.
        assert_eq!(expand_path("~other/.ssh"), "~other/.ssh");
        assert_eq!(expand_path("/abs/~/x"), "/abs/~/x");
    }
}
