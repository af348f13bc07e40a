// src/types.rs

use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Prefix used for handle ids when the configuration does not override it.
pub const DEFAULT_HANDLE_PREFIX: &str = "dirwatch";

/// Upper bound on a whole startup sequence unless configured otherwise.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifier correlating a started native watch with its directory.
///
/// Derived deterministically as `"<prefix>:<directory>"`, so the same
/// directory always maps to the same handle within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(String);

impl HandleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the handle id for `directory`.
    ///
    /// Non-UTF-8 directory names are rendered lossily, which is how two
    /// distinct directories can end up sharing an id.
    pub fn derive(prefix: &str, directory: &Path) -> Self {
        Self(format!("{prefix}:{}", directory.to_string_lossy()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject prefixes that would make `"<prefix>:<directory>"` ambiguous.
    pub fn check_prefix(prefix: &str) -> Result<(), &'static str> {
        if prefix.trim().is_empty() {
            Err("must not be empty")
        } else if prefix.contains(':') {
            Err("must not contain ':'")
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque id a backend hands out for a running native watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchPid(pub u64);

impl fmt::Display for WatchPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_carry_prefix_and_directory() {
        let id = HandleId::derive("dirwatch", Path::new("./watched"));
        assert_eq!(id.as_str(), "dirwatch:./watched");
    }

    #[test]
    fn same_directory_same_id() {
        let a = HandleId::derive("p", Path::new("/tmp/a"));
        let b = HandleId::derive("p", Path::new("/tmp/a"));
        assert_eq!(a, b);
        assert_ne!(a, HandleId::derive("p", Path::new("/tmp/b")));
    }

    #[test]
    fn prefix_rules() {
        assert!(HandleId::check_prefix("dirwatch").is_ok());
        assert_eq!(HandleId::check_prefix(" "), Err("must not be empty"));
        assert_eq!(HandleId::check_prefix("a:b"), Err("must not contain ':'"));
    }
}
