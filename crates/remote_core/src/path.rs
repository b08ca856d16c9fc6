//! Dotted object paths.
//!
//! `objPath` strings look like `engine.object.member`: the first segment
//! names a runtime, the remaining segments address a member of that
//! runtime's object graph.

use std::fmt;

/// A parsed `objPath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjPath {
    engine: String,
    segments: Vec<String>,
}

impl ObjPath {
    /// Split a dotted path into its engine name and member segments.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split('.').map(str::to_string);
        let engine = parts.next().unwrap_or_default();
        Self {
            engine,
            segments: parts.collect(),
        }
    }

    /// The runtime name (first segment).
    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// The member segments after the engine name.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The member path without the engine name, dot-joined.
    #[must_use]
    pub fn member_path(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for ObjPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.engine)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}
