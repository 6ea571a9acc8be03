//! Canonical semantic event types for Plait agent streams.
//!
//! Every agent subprocess, regardless of which harness spawned it, is adapted
//! into this one vocabulary before the core ever sees it. The types here are
//! pure wire shapes: no state, no I/O.

pub mod events;
pub mod messages;

pub use events::{AgentEvent, StreamPayload};
pub use messages::{StopReason, TokenUsage};
