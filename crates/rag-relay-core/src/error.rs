//! Failure types for chunked and single-shot querying.
//!
//! Planning and rendering cannot fail; every error here originates from a
//! responder call or from cancellation. A failed chunk aborts the whole run:
//! no synthesis is ever attempted over an incomplete set of partial answers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The responder failed while answering one chunk.
    #[error("chunk {index}/{total} failed")]
    Chunk {
        index: usize,
        total: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The responder failed during the final synthesis call.
    #[error("synthesis over {chunk_count} chunks failed")]
    Synthesis {
        chunk_count: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The responder failed during a single-shot (unchunked) call.
    #[error("single-shot request failed")]
    Direct {
        #[source]
        source: anyhow::Error,
    },

    /// The run was cancelled through its token.
    #[error("cancelled after {completed} of {total} chunks")]
    Cancelled { completed: usize, total: usize },
}

impl RelayError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled { .. })
    }
}
