//! Core data types for the store.
//!
//! - [`StoreValue`]: recursive tree node (scalar, mapping or capped sequence)
//! - [`Scalar`]: leaf values written by workers and probes
//! - [`Datum`]: one timestamped line of collected output

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::CollectorKind;

/// One unit of collected output, attributed to a node and collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    /// Raw output line, without the trailing newline.
    pub payload: String,
    /// When the line was processed (UTC).
    pub ts: DateTime<Utc>,
    /// Node the line came from.
    pub node: String,
    /// Collector instance name.
    pub collector: String,
    /// Collector kind.
    pub collector_type: CollectorKind,
}

impl Datum {
    /// Create a datum stamped with the current time.
    pub fn new(
        payload: impl Into<String>,
        node: impl Into<String>,
        collector: impl Into<String>,
        collector_type: CollectorKind,
    ) -> Self {
        Self {
            payload: payload.into(),
            ts: Utc::now(),
            node: node.into(),
            collector: collector.into(),
            collector_type,
        }
    }
}

/// Leaf value stored in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Datum(Datum),
    Text(String),
}

/// A node in the store tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    /// Leaf value.
    Scalar(Scalar),
    /// Nested keys. Order is irrelevant.
    Mapping(HashMap<String, StoreValue>),
    /// Ordered history, oldest first, truncated on every push.
    Sequence(VecDeque<StoreValue>),
}

impl StoreValue {
    /// An empty mapping.
    pub fn mapping() -> Self {
        Self::Mapping(HashMap::new())
    }

    /// Shape name used in conflict errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Scalar(Scalar::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_datum(&self) -> Option<&Datum> {
        match self {
            Self::Scalar(Scalar::Datum(d)) => Some(d),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&HashMap<String, StoreValue>> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&VecDeque<StoreValue>> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Datum entries of a sequence, in push order. Non-datum items are skipped.
    pub fn datums(&self) -> Vec<&Datum> {
        self.as_sequence()
            .map(|items| items.iter().filter_map(StoreValue::as_datum).collect())
            .unwrap_or_default()
    }
}

impl From<Scalar> for StoreValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for StoreValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for StoreValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<f64> for StoreValue {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }
}

impl From<DateTime<Utc>> for StoreValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Scalar(Scalar::Timestamp(value))
    }
}

impl From<Datum> for StoreValue {
    fn from(value: Datum) -> Self {
        Self::Scalar(Scalar::Datum(value))
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::Text(value))
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::Text(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_shape() {
        let v = StoreValue::from(true);
        assert_eq!(v.as_bool(), Some(true));
        assert_eq!(v.as_timestamp(), None);
        assert_eq!(v.shape(), "scalar");

        let m = StoreValue::mapping();
        assert!(m.as_mapping().is_some());
        assert_eq!(m.shape(), "mapping");
        assert!(m.datums().is_empty());
    }

    #[test]
    fn test_datums_in_order() {
        let items: VecDeque<StoreValue> = ["x", "y"]
            .into_iter()
            .map(|p| Datum::new(p, "db1", "top", CollectorKind::MongoTop).into())
            .collect();
        let seq = StoreValue::Sequence(items);
        let payloads: Vec<&str> = seq.datums().iter().map(|d| d.payload.as_str()).collect();
        assert_eq!(payloads, ["x", "y"]);
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let mut map = HashMap::new();
        map.insert("primary".to_string(), StoreValue::from(false));
        let json = serde_json::to_value(StoreValue::Mapping(map)).unwrap();
        assert_eq!(json, serde_json::json!({ "primary": false }));
    }
}
