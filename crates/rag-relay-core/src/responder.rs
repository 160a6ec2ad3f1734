//! Language-model responder abstraction.
//!
//! The [`Responder`] trait is the only side-effecting seam in the core
//! crate: it turns one prompt into one model reply. Concrete HTTP backends
//! (OpenAI-compatible, Anthropic) live in the `rag-relay` app crate; this
//! module ships [`EchoResponder`], an offline implementation for dry runs
//! and tests.
//!
//! Every call receives a [`CancelToken`] so long multi-chunk runs can be
//! abandoned early.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponderRequest {
    /// Full rendered prompt text.
    pub prompt: String,
    pub model_name: String,
    /// Role-setting instruction, distinct per call type.
    pub system_prompt: String,
    /// Ask the model for extended reasoning ("thinking"), when supported.
    pub enable_reasoning: bool,
}

/// One model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderReply {
    pub content: String,
    /// Reasoning text; may be empty.
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub has_reasoning: bool,
}

/// Shared cancellation flag.
///
/// Cloning yields a handle to the same flag. Once cancelled, a token stays
/// cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A backend that answers prompts with a language model.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use rag_relay_core::responder::{CancelToken, Responder, ResponderReply, ResponderRequest};
///
/// struct Shouty;
///
/// #[async_trait]
/// impl Responder for Shouty {
///     fn name(&self) -> &str { "shouty" }
///
///     async fn respond(&self, req: &ResponderRequest, _cancel: &CancelToken) -> Result<ResponderReply> {
///         Ok(ResponderReply { content: req.prompt.to_uppercase(), ..Default::default() })
///     }
/// }
/// ```
#[async_trait]
pub trait Responder: Send + Sync {
    /// Backend identifier used in logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Send one prompt and wait for the reply.
    ///
    /// Implementations should give up promptly once `cancel` is set.
    /// Errors cover network failures, API errors, rate limiting, and
    /// malformed model output.
    async fn respond(&self, request: &ResponderRequest, cancel: &CancelToken)
        -> Result<ResponderReply>;
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for Arc<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn respond(
        &self,
        request: &ResponderRequest,
        cancel: &CancelToken,
    ) -> Result<ResponderReply> {
        (**self).respond(request, cancel).await
    }
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn respond(
        &self,
        request: &ResponderRequest,
        cancel: &CancelToken,
    ) -> Result<ResponderReply> {
        (**self).respond(request, cancel).await
    }
}

/// Offline responder that answers with a summary of the prompt it received.
///
/// The reply names the model and the first non-empty prompt line, which is
/// enough to trace chunk plumbing end-to-end without network access.
#[derive(Debug, Default)]
pub struct EchoResponder {
    calls: AtomicUsize,
}

impl EchoResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `respond` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for EchoResponder {
    fn name(&self) -> &str {
        "echo"
    }

    async fn respond(
        &self,
        request: &ResponderRequest,
        cancel: &CancelToken,
    ) -> Result<ResponderReply> {
        if cancel.is_cancelled() {
            bail!("request cancelled");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        let first_line = request
            .prompt
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        let content = format!(
            "echo({}): {} [{} chars]",
            request.model_name,
            first_line,
            request.prompt.chars().count()
        );

        let (reasoning, has_reasoning) = if request.enable_reasoning {
            ("echo reasoning".to_string(), true)
        } else {
            (String::new(), false)
        };

        Ok(ResponderReply {
            content,
            reasoning,
            has_reasoning,
        })
    }
}
