// src/engine/mod.rs

//! Session engine.
//!
//! This module ties together:
//! - the correlator that decodes raw native notifications ([`correlator`])
//! - the single-threaded actor loop that feeds them to the user handler
//!   ([`session`])
//! - the all-or-nothing startup protocol that mounts one native watch per
//!   directory before the loop starts ([`startup`])

pub mod correlator;
pub mod session;
pub mod startup;

pub use correlator::{Selected, select};
pub use session::{Phase, Session, SessionExit, SessionHandle};
pub use startup::start_session;
