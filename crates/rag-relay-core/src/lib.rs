//! # RAG Relay Core
//!
//! Budget-aware chunking for retrieval-augmented question answering.
//!
//! When the context retrieved for a question (database tables, web pages,
//! documents) is too large for one model call, this crate splits it into
//! size-bounded chunks, asks the model the question once per chunk, and
//! asks once more to synthesize the partial answers into one.
//!
//! ```text
//! items ─▶ plan ─▶ render ─▶ Responder × N ─▶ synthesis ─▶ FinalAnswer
//! ```
//!
//! The only side effect is the [`responder::Responder`] trait; HTTP
//! backends, configuration, and the CLI live in the `rag-relay` crate.

pub mod coordinator;
pub mod direct;
pub mod error;
pub mod models;
pub mod plan;
pub mod profile;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod responder;

pub use coordinator::{run, RunOptions};
pub use direct::answer;
pub use error::RelayError;
pub use models::{
    Answer, Cell, DirectAnswer, FinalAnswer, PartialAnswer, RetrievableItem, SourceKind,
    SourceSummary,
};
pub use plan::{plan, Chunk};
pub use profile::{profile_for, ModelProfile};
pub use responder::{CancelToken, EchoResponder, Responder, ResponderReply, ResponderRequest};
