//! A provider-neutral protocol for chat models with function calling.
//!
//! The agent talks to every supported LLM through the types in this crate,
//! so that switching between providers never touches the orchestration code.
//! Besides chat completions, the crate also describes embedding providers,
//! which the tool library relies on for similarity search.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod embedding;
mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use embedding::*;
pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
