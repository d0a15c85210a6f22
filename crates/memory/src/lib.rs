//! Conversation memory for Parley.

pub mod conversation;

pub use conversation::{ConversationMemory, MemoryStats, TurnGuard};
