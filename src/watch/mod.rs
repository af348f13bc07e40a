// src/watch/mod.rs

//! Watch configuration.
//!
//! [`WatchConfig`] collects the directories to watch, the handler and its
//! initial state. It does **not** talk to the native facility; handing a
//! configuration to [`crate::engine::start_session`] (or calling
//! [`WatchConfig::start`]) does that.

pub mod builder;
pub mod handler;

pub use builder::WatchConfig;
pub use handler::{ActorFn, ActorHandler, Step, fan_out};
