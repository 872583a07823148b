//! Server-side sessions for tokenbridge.
//!
//! This crate provides:
//! - The session model (`Session`): a string map scoped to one user agent
//! - The storage seam (`SessionStore`) and an in-process implementation
//! - Token binding (`SessionBinder`), the only writer of token slots
//!
//! Session lifetime belongs to the store. The binder touches two slots,
//! [`ACCESS_TOKEN_KEY`] and [`INSTANCE_URL_KEY`], and nothing else.

pub mod binder;
pub mod error;
pub mod session;
pub mod store;

pub use binder::SessionBinder;
pub use error::SessionError;
pub use session::{ACCESS_TOKEN_KEY, INSTANCE_URL_KEY, Session};
pub use store::{MemorySessionStore, SessionStore};
pub use tokenbridge_core::SessionId;
