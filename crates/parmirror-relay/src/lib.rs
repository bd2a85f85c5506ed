//! The parmirror relay.
//!
//! Accepts any number of client connections and fans every broadcast
//! message out to all of them — deliberately including an echo back to
//! the sender, which keeps multi-client mirroring simple without a
//! "sender" concept. The relay never interprets message contents
//! beyond the type tag; it is plumbing, not policy.

pub mod error;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{RelayError, Result};
pub use registry::SessionRegistry;
pub use server::RelayServer;
pub use session::{ClientSession, SessionId, DEFAULT_WRITE_TIMEOUT};
