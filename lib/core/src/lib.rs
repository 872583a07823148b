//! Core types shared by the tokenbridge crates.
//!
//! Provides the rootcause-based `Result` alias and the strongly-typed
//! identifiers used for sessions and individual consent flows.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{FlowId, ParseIdError, SessionId};
