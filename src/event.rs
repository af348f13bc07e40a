// src/event.rs

//! Normalized change taxonomy.
//!
//! Native backends speak their own vocabulary ("removed", "deleted",
//! "IN_CLOSE_WRITE", ...). Everything entering the engine is mapped onto
//! [`Event`] through [`normalize`], which never fails: identifiers it does
//! not recognise are carried through as [`Event::Unknown`].

use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A normalized filesystem change kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    Created,
    Modified,
    /// File closed after being opened for writing.
    Closed,
    Deleted,
    Renamed,
    /// Metadata (permissions, timestamps, ownership) changed.
    Attribute,
    /// Native signal with no mapping; the raw identifier is kept verbatim.
    Unknown(String),
}

impl Event {
    /// Canonical identifier, or the raw one for [`Event::Unknown`].
    pub fn as_str(&self) -> &str {
        match self {
            Event::Created => "created",
            Event::Modified => "modified",
            Event::Closed => "closed",
            Event::Deleted => "deleted",
            Event::Renamed => "renamed",
            Event::Attribute => "attribute",
            Event::Unknown(raw) => raw,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Event::Unknown(_))
    }
}

/// Map a native signal identifier onto an [`Event`].
///
/// Matching is case-insensitive and `removed` is an alias for `deleted`.
pub fn normalize(id: &str) -> Event {
    match id.to_ascii_lowercase().as_str() {
        "created" => Event::Created,
        "deleted" | "removed" => Event::Deleted,
        "modified" => Event::Modified,
        "closed" => Event::Closed,
        "renamed" => Event::Renamed,
        "attribute" => Event::Attribute,
        _ => Event::Unknown(id.to_string()),
    }
}

impl FromStr for Event {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize(s))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One correlated notification: a path and every event attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub events: Vec<Event>,
}

impl Change {
    pub fn new(path: impl Into<PathBuf>, events: Vec<Event>) -> Self {
        Self {
            path: path.into(),
            events,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_identifiers_map_to_their_variant() {
        assert_eq!(normalize("created"), Event::Created);
        assert_eq!(normalize("modified"), Event::Modified);
        assert_eq!(normalize("closed"), Event::Closed);
        assert_eq!(normalize("renamed"), Event::Renamed);
        assert_eq!(normalize("attribute"), Event::Attribute);
    }

    #[test]
    fn removed_is_an_alias_for_deleted() {
        assert_eq!(normalize("removed"), Event::Deleted);
        assert_eq!(normalize("deleted"), Event::Deleted);
        assert_eq!(normalize("removed"), normalize("deleted"));
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(normalize("CREATED"), Event::Created);
        assert_eq!(normalize("Removed"), Event::Deleted);
    }

    #[test]
    fn unknown_keeps_the_raw_identifier() {
        assert_eq!(normalize("IsFile"), Event::Unknown("IsFile".to_string()));
        assert_eq!(normalize(""), Event::Unknown(String::new()));
        assert_eq!(normalize("IsFile").to_string(), "IsFile");
    }

    #[test]
    fn display_uses_canonical_names() {
        assert_eq!(Event::Deleted.to_string(), "deleted");
        assert_eq!("removed".parse::<Event>().unwrap().to_string(), "deleted");
    }

    proptest! {
        #[test]
        fn normalize_is_total_and_lossless(id in ".*") {
            match normalize(&id) {
                Event::Unknown(raw) => prop_assert_eq!(raw, id),
                known => {
                    let lower = id.to_ascii_lowercase();
                    let canonical = if lower == "removed" { "deleted" } else { lower.as_str() };
                    prop_assert_eq!(known.as_str(), canonical);
                }
            }
        }
    }
}
