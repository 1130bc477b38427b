//! Core logic of the tool-library agent: tools and their library, prompt
//! templates, retrying provider clients and the agent loop.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod agent;
pub mod conversation;
mod embedding_client;
pub mod library;
mod model_client;
pub mod prompts;
mod retry;
pub mod tool;

pub use agent::{Agent, AgentBuilder, Response, Strategy};
pub use conversation::TranscriptSource;
pub use library::{ToolLibrary, ToolMatch};
pub use retry::RetryPolicy;
