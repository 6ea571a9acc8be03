//! Runtime message model and the pure stream decoder.

mod decoder;
mod model;

pub use decoder::reduce;
pub use model::{AgentMessage, ContentBlock, MessageStatus, ProcessState};
