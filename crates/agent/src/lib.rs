//! The reply loop: the heart of Parley.
//!
//! One turn follows a fixed sequence, serialized per conversation:
//!
//! 1. **Receive** the user's text (blank text gets a canned nudge)
//! 2. **Remember** it in the conversation's bounded history
//! 3. **Generate** a reply from the trimmed history and persona instruction
//! 4. **Remember** the reply and hand it back to the caller
//!
//! Generation never fails; when every provider is down the reply is an
//! in-character apology, which is remembered like any other reply.

pub mod engine;
pub mod persona;

pub use engine::ReplyEngine;
pub use persona::Persona;
