//! Collector list validation.

use std::collections::HashSet;

use crate::collector::CollectorSpec;
use crate::config::NodeSpec;
use crate::store::LATEST_KEY;

use super::validation::ConfigError;

/// Validate all collector definitions against the node list.
///
/// Collector names head the `<collector>.<node>` datum paths, so they must be
/// unique, must not shadow the `latest` subtree and must not collide with a
/// node name.
pub fn validate_collectors(
    collectors: &[CollectorSpec],
    nodes: &[NodeSpec],
) -> Result<(), ConfigError> {
    let node_names: HashSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    let mut seen_names = HashSet::new();

    for spec in collectors {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "collector name cannot be empty".to_string(),
            ));
        }
        if spec.name.contains('.') {
            return Err(ConfigError::ValidationError(format!(
                "collector name '{}' cannot contain '.'",
                spec.name
            )));
        }
        if spec.name == LATEST_KEY {
            return Err(ConfigError::ValidationError(format!(
                "collector name '{LATEST_KEY}' is reserved"
            )));
        }
        if node_names.contains(spec.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "collector name '{}' collides with a node name",
                spec.name
            )));
        }
        if !seen_names.insert(spec.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate collector name: '{}'",
                spec.name
            )));
        }
        spec.validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorKind;

    fn nodes() -> Vec<NodeSpec> {
        vec![NodeSpec::new("db1", "10.0.0.11")]
    }

    #[test]
    fn test_valid_collectors() {
        let collectors = vec![
            CollectorSpec::new("top", CollectorKind::MongoTop),
            CollectorSpec::new("log", CollectorKind::Tail).with_file("/var/log/mongod.log"),
        ];
        assert!(validate_collectors(&collectors, &nodes()).is_ok());
    }

    #[test]
    fn test_duplicate_names() {
        let collectors = vec![
            CollectorSpec::new("dup", CollectorKind::MongoTop),
            CollectorSpec::new("dup", CollectorKind::MongoStat),
        ];
        let err = validate_collectors(&collectors, &nodes()).unwrap_err();
        assert!(err.to_string().contains("duplicate collector name"));
    }

    #[test]
    fn test_reserved_and_colliding_names() {
        let reserved = vec![CollectorSpec::new("latest", CollectorKind::MongoTop)];
        assert!(validate_collectors(&reserved, &nodes()).is_err());

        let colliding = vec![CollectorSpec::new("db1", CollectorKind::MongoTop)];
        assert!(validate_collectors(&colliding, &nodes()).is_err());

        let dotted = vec![CollectorSpec::new("mongo.top", CollectorKind::MongoTop)];
        assert!(validate_collectors(&dotted, &nodes()).is_err());
    }

    #[test]
    fn test_kind_requirements_surface() {
        let collectors = vec![CollectorSpec::new("log", CollectorKind::Tail)];
        let err = validate_collectors(&collectors, &nodes()).unwrap_err();
        assert!(err.to_string().contains("missing required field 'file'"));
    }
}
