use std::path::{Path, PathBuf};

use dirwatch::native::{FILE_EVENT_TAG, NativeMessage, Payload};
use dirwatch::types::{DEFAULT_HANDLE_PREFIX, HandleId};

/// Handle id the orchestrator derives for `dir` with the default prefix.
pub fn handle_for(dir: impl AsRef<Path>) -> HandleId {
    HandleId::derive(DEFAULT_HANDLE_PREFIX, dir.as_ref())
}

/// Builder for raw native notifications.
pub struct NotificationBuilder {
    source: HandleId,
    path: PathBuf,
    events: Vec<String>,
}

impl NotificationBuilder {
    /// Notification coming from the watch on `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            source: handle_for(dir),
            path: PathBuf::new(),
            events: Vec::new(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn event(mut self, id: &str) -> Self {
        self.events.push(id.to_string());
        self
    }

    pub fn build(self) -> NativeMessage {
        NativeMessage::file_event(self.source, self.path, self.events)
    }

    /// Same source, but with a payload the correlator cannot decode.
    pub fn build_malformed(self) -> NativeMessage {
        NativeMessage::Tagged {
            source: self.source,
            tag: FILE_EVENT_TAG.to_string(),
            payload: Payload::Opaque(format!("{:?}", self.events)),
        }
    }
}
