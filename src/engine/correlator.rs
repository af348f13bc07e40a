// src/engine/correlator.rs

//! Selector turning raw mailbox messages into typed [`Change`]s.
//!
//! Stateless: the same function serves every session concurrently.

use std::path::PathBuf;

use crate::errors::{DirwatchError, Result};
use crate::event::{Change, normalize};
use crate::native::{FILE_EVENT_TAG, NativeMessage, Payload};
use crate::types::HandleId;

/// Outcome of running one message through [`select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    Change(Change),
    /// The native watch behind this handle has ended.
    WatcherStopped(HandleId),
    /// Not a watch notification.
    Ignored,
}

/// Decode one mailbox message.
///
/// A `file_event` message whose payload cannot be decoded means the backend
/// and the engine disagree on the message shape; that is reported as
/// [`DirwatchError::DecodeContractViolation`] instead of being dropped.
pub fn select(message: NativeMessage) -> Result<Selected> {
    let (source, payload) = match message {
        NativeMessage::Tagged {
            source,
            tag,
            payload,
        } if tag == FILE_EVENT_TAG => (source, payload),
        NativeMessage::Tagged { .. } | NativeMessage::Other(_) => return Ok(Selected::Ignored),
    };

    match payload {
        Payload::Event { path, events } => {
            let path = decode_path(path).map_err(|detail| {
                DirwatchError::DecodeContractViolation(format!("{source}: {detail}"))
            })?;
            let events = events.iter().map(|id| normalize(id)).collect();
            Ok(Selected::Change(Change { path, events }))
        }
        Payload::Stop => Ok(Selected::WatcherStopped(source)),
        Payload::Opaque(raw) => Err(DirwatchError::DecodeContractViolation(format!(
            "{source}: unexpected {FILE_EVENT_TAG} payload {raw:?}"
        ))),
    }
}

#[cfg(unix)]
fn decode_path(bytes: Vec<u8>) -> std::result::Result<PathBuf, String> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    if bytes.is_empty() {
        return Err("empty path".to_string());
    }
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn decode_path(bytes: Vec<u8>) -> std::result::Result<PathBuf, String> {
    if bytes.is_empty() {
        return Err("empty path".to_string());
    }
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| format!("path is not valid UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn handle() -> HandleId {
        HandleId::derive("dirwatch", "/w".as_ref())
    }

    #[test]
    fn file_event_becomes_change_with_normalized_events() {
        let msg = NativeMessage::file_event(handle(), "/w/a.txt", ["created", "REMOVED", "IsFile"]);
        let selected = select(msg).unwrap();

        assert_eq!(
            selected,
            Selected::Change(Change::new(
                "/w/a.txt",
                vec![
                    Event::Created,
                    Event::Deleted,
                    Event::Unknown("IsFile".to_string())
                ]
            ))
        );
    }

    #[test]
    fn other_tags_and_messages_are_ignored() {
        let other_tag = NativeMessage::Tagged {
            source: handle(),
            tag: "heartbeat".to_string(),
            payload: Payload::Opaque("x".to_string()),
        };
        assert_eq!(select(other_tag).unwrap(), Selected::Ignored);
        assert_eq!(
            select(NativeMessage::Other("ping".to_string())).unwrap(),
            Selected::Ignored
        );
    }

    #[test]
    fn stop_payload_reports_the_handle() {
        let selected = select(NativeMessage::stopped(handle())).unwrap();
        assert_eq!(selected, Selected::WatcherStopped(handle()));
    }

    #[test]
    fn malformed_file_event_is_a_contract_violation() {
        let msg = NativeMessage::Tagged {
            source: handle(),
            tag: FILE_EVENT_TAG.to_string(),
            payload: Payload::Opaque("garbage".to_string()),
        };
        assert!(matches!(
            select(msg),
            Err(DirwatchError::DecodeContractViolation(_))
        ));

        let empty = NativeMessage::Tagged {
            source: handle(),
            tag: FILE_EVENT_TAG.to_string(),
            payload: Payload::Event {
                path: Vec::new(),
                events: vec!["created".to_string()],
            },
        };
        assert!(matches!(
            select(empty),
            Err(DirwatchError::DecodeContractViolation(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_survive_decoding() {
        use std::os::unix::ffi::OsStrExt;

        let raw = b"/w/caf\xe9".to_vec();
        let msg = NativeMessage::Tagged {
            source: handle(),
            tag: FILE_EVENT_TAG.to_string(),
            payload: Payload::Event {
                path: raw.clone(),
                events: vec!["modified".to_string()],
            },
        };
        match select(msg).unwrap() {
            Selected::Change(change) => {
                assert_eq!(change.path.as_os_str().as_bytes(), raw.as_slice());
                assert_eq!(change.events, vec![Event::Modified]);
            }
            other => panic!("expected a change, got {other:?}"),
        }
    }
}
