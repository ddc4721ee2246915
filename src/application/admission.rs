//! RunAdmission - at most one in-flight inference run per conversation.
//!
//! ```text
//!   Idle ──submit──► Running ──(engine returns, ok or err)──► Idle
//!                       │
//!                       └──submit──► RunInProgress (nothing mutated)
//! ```
//!
//! This is a mutual-exclusion flag, not a queue. The run's cleanup lives in a
//! drop guard so the flag is released even if the engine panics.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::RunId;
use crate::domain::transcript::{Block, Transcript};
use crate::ports::{RunContext, ToolRegistry};

use super::conversation::Conversation;
use super::error::StreamError;

/// An admitted run.
pub struct AdmittedRun {
    pub run_id: RunId,
    /// Completes once the run has finished and the conversation is idle again.
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct RunAdmission {
    tools: Arc<dyn ToolRegistry>,
}

impl RunAdmission {
    pub fn new(tools: Arc<dyn ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Appends `prompt` and launches a run, or rejects if one is in flight.
    pub fn submit(&self, conv: &Arc<Conversation>, prompt: &str) -> Result<AdmittedRun, StreamError> {
        let (cancel, transcript) = {
            let mut run = conv.run.lock();
            if run.running {
                return Err(StreamError::RunInProgress {
                    conv_id: conv.id().clone(),
                    run_id: conv.run_id(),
                });
            }
            run.transcript.push(Block::user(prompt));
            run.running = true;
            let cancel = CancellationToken::new();
            run.cancel = Some(cancel.clone());
            (cancel, run.transcript.clone())
        };
        conv.touch();

        let run_id = conv.run_id();
        tracing::info!(conv_id = %conv.id(), %run_id, prompt_len = prompt.len(), "run admitted");

        let ctx = RunContext::new(run_id, conv.sink().clone(), self.tools.clone(), cancel.clone());
        let conv = conv.clone();
        let task = tokio::spawn(async move {
            let mut guard = RunGuard {
                conv: conv.clone(),
                cancel,
                outcome: None,
            };
            match conv.engine().run_inference(ctx, transcript).await {
                Ok(updated) => {
                    tracing::info!(conv_id = %conv.id(), blocks = updated.len(), "run completed");
                    guard.outcome = Some(updated);
                }
                Err(failure) => {
                    tracing::warn!(conv_id = %conv.id(), error = %failure, "run failed");
                    guard.outcome = failure.partial;
                }
            }
        });

        Ok(AdmittedRun { run_id, task })
    }

    /// Cancels the in-flight run, if any. Returns whether one was running.
    pub fn cancel(&self, conv: &Conversation) -> bool {
        let run = conv.run.lock();
        match (&run.cancel, run.running) {
            (Some(cancel), true) => {
                cancel.cancel();
                tracing::info!(conv_id = %conv.id(), "run cancellation requested");
                true
            }
            _ => false,
        }
    }
}

/// Returns the conversation to idle when the run task ends, however it ends.
struct RunGuard {
    conv: Arc<Conversation>,
    cancel: CancellationToken,
    outcome: Option<Transcript>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut run = self.conv.run.lock();
        if let Some(transcript) = self.outcome.take() {
            run.transcript = transcript;
        }
        run.running = false;
        run.cancel = None;
        drop(run);
        self.conv.touch();
        self.cancel.cancel();
    }
}
