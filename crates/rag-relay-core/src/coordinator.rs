//! Scatter-gather query coordinator.
//!
//! Drives one responder call per planned chunk, then one synthesis call over
//! all partial answers.
//!
//! # Protocol
//!
//! ```text
//! items ──plan──▶ chunks ─┬─ ≤ 1 chunk ──▶ Ok(None)   (caller uses its single-shot path)
//!                         │
//!                         └─ N chunks ──▶ render + respond × N   (reasoning off)
//!                                           │
//!                                           ▼
//!                                  synthesis respond × 1  (caller's reasoning preference)
//!                                           │
//!                                           ▼
//!                                      FinalAnswer
//! ```
//!
//! Chunks are processed sequentially by default: chunk *i* is answered and
//! recorded before chunk *i + 1* is issued. With `max_concurrency > 1` the
//! per-chunk calls overlap, but answers are stored by chunk index so the
//! observable ordering is the same as a sequential run.
//!
//! Any responder failure aborts the run; the remaining chunks are not
//! issued and no synthesis happens.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::models::{FinalAnswer, PartialAnswer, RetrievableItem};
use crate::plan::{is_single_shot, plan, Chunk};
use crate::profile::{profile_for, ModelProfile};
use crate::progress::{ChunkProgressEvent, NoProgress, ProgressReporter};
use crate::prompts;
use crate::render::{merge_sources, render};
use crate::responder::{CancelToken, Responder, ResponderRequest};

/// Caller-controlled knobs for one run.
#[derive(Clone)]
pub struct RunOptions {
    /// Reasoning preference for the synthesis (or single-shot) call.
    /// Per-chunk calls never request reasoning.
    pub enable_reasoning: bool,
    /// Maximum number of chunk calls in flight. `1` means sequential.
    pub max_concurrency: usize,
    pub progress: Arc<dyn ProgressReporter>,
    pub cancel: CancelToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            enable_reasoning: false,
            max_concurrency: 1,
            progress: Arc::new(NoProgress),
            cancel: CancelToken::new(),
        }
    }
}

/// Answer `query` over `items` with chunked processing.
///
/// Returns `Ok(None)` when the plan has zero or one chunk: that is the
/// hand-off signal telling the caller to use an ordinary single request.
pub async fn run<R>(
    query: &str,
    items: &[RetrievableItem],
    model_name: &str,
    responder: &R,
    options: &RunOptions,
) -> Result<Option<FinalAnswer>, RelayError>
where
    R: Responder + ?Sized,
{
    let chunks = plan(items, model_name);
    if is_single_shot(&chunks) {
        debug!(
            chunks = chunks.len(),
            "chunked processing not needed, handing off"
        );
        return Ok(None);
    }

    let total = chunks.len();
    let profile = profile_for(model_name);
    info!(
        model = model_name,
        responder = responder.name(),
        items = items.len(),
        chunks = total,
        "starting chunked run"
    );
    options.progress.report(ChunkProgressEvent::Planned {
        chunk_count: total,
        item_count: items.len(),
    });

    let partials = if options.max_concurrency <= 1 {
        answer_sequential(query, &chunks, profile, model_name, responder, options).await?
    } else {
        answer_concurrent(query, &chunks, profile, model_name, responder, options).await?
    };

    if options.cancel.is_cancelled() {
        return Err(RelayError::Cancelled {
            completed: total,
            total,
        });
    }
    options
        .progress
        .report(ChunkProgressEvent::Synthesizing { total });

    let request = ResponderRequest {
        prompt: prompts::synthesis_prompt(query, &partials),
        model_name: model_name.to_string(),
        system_prompt: prompts::SYNTHESIS_SYSTEM_PROMPT.to_string(),
        enable_reasoning: options.enable_reasoning,
    };
    let reply = responder
        .respond(&request, &options.cancel)
        .await
        .map_err(|source| {
            if options.cancel.is_cancelled() {
                RelayError::Cancelled {
                    completed: total,
                    total,
                }
            } else {
                warn!(error = %format!("{:#}", source), "synthesis call failed");
                RelayError::Synthesis {
                    chunk_count: total,
                    source,
                }
            }
        })?;
    info!(chunks = total, "synthesis complete");

    let chunk_sources: Vec<_> = partials
        .iter()
        .flat_map(|p| p.sources_used.iter().cloned())
        .collect();

    Ok(Some(FinalAnswer {
        content: reply.content,
        reasoning: reply.reasoning,
        has_reasoning: reply.has_reasoning,
        chunk_count: total,
        all_sources_used: merge_sources(&chunk_sources),
        partial_answers: partials,
    }))
}

async fn answer_sequential<R>(
    query: &str,
    chunks: &[Chunk<&RetrievableItem>],
    profile: &ModelProfile,
    model_name: &str,
    responder: &R,
    options: &RunOptions,
) -> Result<Vec<PartialAnswer>, RelayError>
where
    R: Responder + ?Sized,
{
    let total = chunks.len();
    let mut partials = Vec::with_capacity(total);

    for (i, chunk) in chunks.iter().enumerate() {
        let index = i + 1;
        if options.cancel.is_cancelled() {
            return Err(RelayError::Cancelled {
                completed: partials.len(),
                total,
            });
        }
        options
            .progress
            .report(ChunkProgressEvent::ChunkStarted { index, total });
        let partial = answer_chunk(
            query, chunk, index, total, profile, model_name, responder, &options.cancel,
        )
        .await?;
        partials.push(partial);
        options
            .progress
            .report(ChunkProgressEvent::ChunkCompleted { index, total });
    }

    Ok(partials)
}

async fn answer_concurrent<R>(
    query: &str,
    chunks: &[Chunk<&RetrievableItem>],
    profile: &ModelProfile,
    model_name: &str,
    responder: &R,
    options: &RunOptions,
) -> Result<Vec<PartialAnswer>, RelayError>
where
    R: Responder + ?Sized,
{
    let total = chunks.len();
    let mut slots: Vec<Option<PartialAnswer>> = vec![None; total];
    let mut completed = 0usize;

    let mut pending = stream::iter(chunks.iter().enumerate().map(|(i, chunk)| {
        let index = i + 1;
        async move {
            if options.cancel.is_cancelled() {
                return (i, Err(RelayError::Cancelled { completed: 0, total }));
            }
            options
                .progress
                .report(ChunkProgressEvent::ChunkStarted { index, total });
            let result = answer_chunk(
                query, chunk, index, total, profile, model_name, responder, &options.cancel,
            )
            .await;
            (i, result)
        }
    }))
    .buffer_unordered(options.max_concurrency);

    while let Some((i, result)) = pending.next().await {
        match result {
            Ok(partial) => {
                slots[i] = Some(partial);
                completed += 1;
                options.progress.report(ChunkProgressEvent::ChunkCompleted {
                    index: i + 1,
                    total,
                });
            }
            Err(RelayError::Cancelled { total, .. }) => {
                return Err(RelayError::Cancelled { completed, total });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

#[allow(clippy::too_many_arguments)]
async fn answer_chunk<R>(
    query: &str,
    chunk: &Chunk<&RetrievableItem>,
    index: usize,
    total: usize,
    profile: &ModelProfile,
    model_name: &str,
    responder: &R,
    cancel: &CancelToken,
) -> Result<PartialAnswer, RelayError>
where
    R: Responder + ?Sized,
{
    let rendered = render(chunk, profile);
    debug!(
        index,
        total,
        items = chunk.len(),
        estimated = chunk.estimated_size(),
        rendered = rendered.prompt_text.len(),
        "rendered chunk"
    );

    let request = ResponderRequest {
        prompt: prompts::chunk_prompt(index, total, &rendered.prompt_text, query),
        model_name: model_name.to_string(),
        system_prompt: prompts::CHUNK_SYSTEM_PROMPT.to_string(),
        enable_reasoning: false,
    };

    let reply = responder.respond(&request, cancel).await.map_err(|source| {
        if cancel.is_cancelled() {
            RelayError::Cancelled {
                completed: index - 1,
                total,
            }
        } else {
            warn!(index, total, error = %format!("{:#}", source), "chunk call failed");
            RelayError::Chunk {
                index,
                total,
                source,
            }
        }
    })?;
    info!(index, total, "chunk answered");

    Ok(PartialAnswer {
        chunk_index: index,
        rendered_text: reply.content,
        sources_used: rendered.sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{EchoResponder, ResponderReply};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn files(n: usize, chars: usize) -> Vec<RetrievableItem> {
        (0..n)
            .map(|i| RetrievableItem::File {
                name: format!("doc{}.txt", i),
                size_bytes: chars as u64,
                content: "x".repeat(chars),
            })
            .collect()
    }

    /// Records every request and fails on a chosen call number.
    struct Recorder {
        requests: Mutex<Vec<ResponderRequest>>,
        fail_on: Option<usize>,
    }

    impl Recorder {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl Responder for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn respond(
            &self,
            request: &ResponderRequest,
            _cancel: &CancelToken,
        ) -> Result<ResponderReply> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            let call = requests.len();
            if self.fail_on == Some(call) {
                bail!("rate limited");
            }
            Ok(ResponderReply {
                content: format!("answer {}", call),
                reasoning: if request.enable_reasoning {
                    "thought".into()
                } else {
                    String::new()
                },
                has_reasoning: request.enable_reasoning,
            })
        }
    }

    #[tokio::test]
    async fn empty_items_hand_off() {
        let echo = EchoResponder::new();
        let out = run("q", &[], "o1-preview", &echo, &RunOptions::default())
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(echo.calls(), 0);
    }

    #[tokio::test]
    async fn single_chunk_hands_off() {
        let echo = EchoResponder::new();
        let out = run("q", &files(3, 10), "gpt-4o", &echo, &RunOptions::default())
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(echo.calls(), 0);
    }

    #[tokio::test]
    async fn chunked_run_issues_n_plus_one_calls() {
        // Default budget 800,000; ~600 chars each → many items per chunk,
        // so use enough items to overflow into several chunks.
        let items = files(4_000, 600);
        let recorder = Recorder::new(None);
        let options = RunOptions {
            enable_reasoning: true,
            ..Default::default()
        };
        let answer = run("what?", &items, "mistral", &recorder, &options)
            .await
            .unwrap()
            .expect("chunked");

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests.len(), answer.chunk_count + 1);
        assert!(answer.chunk_count > 1);
        for (i, req) in requests[..answer.chunk_count].iter().enumerate() {
            assert!(!req.enable_reasoning);
            assert_eq!(req.system_prompt, prompts::CHUNK_SYSTEM_PROMPT);
            assert!(req
                .prompt
                .contains(&format!("(chunk {}/{})", i + 1, answer.chunk_count)));
            assert!(req.prompt.contains("Question: what?"));
        }
        let synthesis = requests.last().unwrap();
        assert!(synthesis.enable_reasoning);
        assert_eq!(synthesis.system_prompt, prompts::SYNTHESIS_SYSTEM_PROMPT);
        assert!(synthesis.prompt.contains("--- Chunk 1 answer ---\nanswer 1"));

        assert_eq!(answer.content, format!("answer {}", requests.len()));
        assert!(answer.has_reasoning);
        assert_eq!(answer.reasoning, "thought");
        let indices: Vec<usize> = answer.partial_answers.iter().map(|p| p.chunk_index).collect();
        assert_eq!(indices, (1..=answer.chunk_count).collect::<Vec<_>>());

        assert_eq!(answer.all_sources_used.len(), 1);
        assert_eq!(answer.all_sources_used[0].identifiers.len(), items.len());
    }

    #[tokio::test]
    async fn failing_chunk_aborts_before_synthesis() {
        let items = files(4_000, 600);
        let recorder = Recorder::new(Some(2));
        let err = run("q", &items, "mistral", &recorder, &RunOptions::default())
            .await
            .unwrap_err();
        match err {
            RelayError::Chunk { index, total, .. } => {
                assert_eq!(index, 2);
                assert!(total > 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(recorder.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_synthesis_is_reported() {
        let items = files(4_000, 600);
        let chunk_count = plan(&items, "mistral").len();
        let recorder = Recorder::new(Some(chunk_count + 1));
        let err = run("q", &items, "mistral", &recorder, &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Synthesis { chunk_count: c, .. } if c == chunk_count));
    }

    #[tokio::test]
    async fn cancelled_token_stops_run() {
        let items = files(4_000, 600);
        let echo = EchoResponder::new();
        let options = RunOptions::default();
        options.cancel.cancel();
        let err = run("q", &items, "mistral", &echo, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Cancelled { completed: 0, .. }));
        assert_eq!(echo.calls(), 0);
    }

    #[tokio::test]
    async fn progress_events_in_order() {
        let items = files(4_000, 600);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let options = RunOptions {
            progress: Arc::new(move |e: ChunkProgressEvent| sink.lock().unwrap().push(e)),
            ..Default::default()
        };
        let answer = run("q", &items, "mistral", &EchoResponder::new(), &options)
            .await
            .unwrap()
            .unwrap();
        let total = answer.chunk_count;

        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            ChunkProgressEvent::Planned {
                chunk_count: total,
                item_count: items.len()
            }
        );
        assert_eq!(events[1], ChunkProgressEvent::ChunkStarted { index: 1, total });
        assert_eq!(events[2], ChunkProgressEvent::ChunkCompleted { index: 1, total });
        assert_eq!(
            *events.last().unwrap(),
            ChunkProgressEvent::Synthesizing { total }
        );
        assert_eq!(events.len(), 2 + 2 * total);
    }

    #[tokio::test]
    async fn concurrent_run_matches_sequential_order() {
        let items = files(4_000, 600);
        let sequential = run("q", &items, "mistral", &EchoResponder::new(), &RunOptions::default())
            .await
            .unwrap()
            .unwrap();
        let options = RunOptions {
            max_concurrency: 4,
            ..Default::default()
        };
        let concurrent = run("q", &items, "mistral", &EchoResponder::new(), &options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sequential, concurrent);
    }

    /// Replies fastest to the highest chunk index.
    struct ReverseLatency;

    #[async_trait]
    impl Responder for ReverseLatency {
        fn name(&self) -> &str {
            "reverse-latency"
        }

        async fn respond(
            &self,
            request: &ResponderRequest,
            _cancel: &CancelToken,
        ) -> Result<ResponderReply> {
            let index: u64 = request
                .prompt
                .split("(chunk ")
                .nth(1)
                .and_then(|rest| rest.split('/').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(std::time::Duration::from_millis(20 * (10 - index.min(10)))).await;
            Ok(ResponderReply {
                content: format!("partial {}", index),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn out_of_order_completion_keeps_plan_order() {
        let items = files(4_000, 600);
        let options = RunOptions {
            max_concurrency: 4,
            ..Default::default()
        };
        let answer = run("q", &items, "mistral", &ReverseLatency, &options)
            .await
            .unwrap()
            .unwrap();

        assert!(answer.chunk_count > 1);
        for (i, partial) in answer.partial_answers.iter().enumerate() {
            assert_eq!(partial.chunk_index, i + 1);
            assert_eq!(partial.rendered_text, format!("partial {}", i + 1));
        }
    }
}
