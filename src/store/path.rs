//! Dotted-path addressing for the store tree.

use std::fmt;
use std::str::FromStr;

use crate::store::StoreError;

/// Separator between segments in a textual path.
pub const SEPARATOR: char = '.';

/// An ordered, non-empty list of non-empty segments addressing a location
/// in the store's mapping tree.
///
/// Parsing text splits on `.`; [`DottedPath::from_segments`] keeps each
/// segment whole, so a node called `10.0.0.1` stays a single key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedPath {
    segments: Vec<String>,
}

impl DottedPath {
    /// Build a path from already-separated segments.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidPath` if there are no segments or any
    /// segment is empty.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return Err(StoreError::InvalidPath(segments.join(".")));
        }
        Ok(Self { segments })
    }

    /// All segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments leading up to the final key.
    pub fn parents(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// The final key.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        &self.segments[self.segments.len() - 1]
    }

    /// Dotted rendering of the first `n` segments, used in error messages.
    pub(crate) fn prefix(&self, n: usize) -> String {
        self.segments[..n.min(self.segments.len())].join(".")
    }
}

impl FromStr for DottedPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_segments(s.split(SEPARATOR))
            .map_err(|_| StoreError::InvalidPath(s.to_string()))
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Conversion accepted by every store operation.
pub trait IntoPath {
    /// Produce a validated path.
    fn into_path(self) -> Result<DottedPath, StoreError>;
}

impl IntoPath for DottedPath {
    fn into_path(self) -> Result<DottedPath, StoreError> {
        Ok(self)
    }
}

impl IntoPath for &DottedPath {
    fn into_path(self) -> Result<DottedPath, StoreError> {
        Ok(self.clone())
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Result<DottedPath, StoreError> {
        self.parse()
    }
}

impl IntoPath for String {
    fn into_path(self) -> Result<DottedPath, StoreError> {
        self.parse()
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Result<DottedPath, StoreError> {
        self.parse()
    }
}
