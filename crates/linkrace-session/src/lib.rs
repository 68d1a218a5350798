//! Live session tracking for linkrace rooms.
//!
//! A *session* is one open connection bound to one room. The room actor
//! owns a [`SessionRegistry`] and uses it two ways:
//!
//! 1. **Registry**: add on connect, remove on disconnect, count for the
//!    idle-cleanup decision.
//! 2. **Dispatch**: fan one encoded [`Frame`] out to every session
//!    ([`SessionRegistry::broadcast`]), or to one ([`SessionRegistry::send_to`])
//!    during replay.
//!
//! ```text
//! Room actor (above)  ← owns the registry, decides what to send
//!     ↕
//! Session layer (this crate)  ← who is connected, delivery
//!     ↕
//! Connection handler tasks  ← drain each session's channel into its socket
//! ```

mod error;
mod registry;

pub use error::SessionError;
pub use registry::{Frame, SessionReceiver, SessionRegistry, SessionSender, session_channel};
