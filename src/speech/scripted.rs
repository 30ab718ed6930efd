//! Scripted recognizer that replays configured transcripts
//!
//! Each request consumes the next queued result. When the queue is empty
//! the recognizer reports itself unavailable. A few directives script the
//! other outcomes:
//!
//! - `<cancel>`: the user dismissed the request
//! - `<silence>`: recognition finished without any candidate
//! - `<error>`: the recognizer failed

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Recognition, SpeechError, SpeechService};

pub struct ScriptedSpeech {
    queue: Mutex<VecDeque<Result<Recognition, SpeechError>>>,
    latency: Duration,
}

impl ScriptedSpeech {
    /// Replay each entry as the outcome of one request
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = entries.into_iter().map(|e| scripted_outcome(e.into())).collect();
        Self {
            queue: Mutex::new(queue),
            latency: Duration::ZERO,
        }
    }

    /// Delay every result, as a real recognizer would while listening
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

fn scripted_outcome(entry: String) -> Result<Recognition, SpeechError> {
    match entry.as_str() {
        "<cancel>" => Ok(Recognition::Cancelled),
        "<silence>" => Ok(Recognition::Transcripts(Vec::new())),
        "<error>" => Err(SpeechError::Failed("scripted failure".to_string())),
        _ => Ok(Recognition::Transcripts(vec![entry.clone()])),
    }
}

#[async_trait]
impl SpeechService for ScriptedSpeech {
    async fn prepare(&self) -> Result<(), SpeechError> {
        let queued = self.queue.lock().await.len();
        info!(queued, "scripted recognizer ready");
        Ok(())
    }

    async fn recognize(&self) -> Result<Recognition, SpeechError> {
        let next = self.queue.lock().await.pop_front();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match next {
            Some(outcome) => {
                debug!(?outcome, "scripted recognition");
                outcome
            }
            None => Err(SpeechError::NotAvailable(
                "no scripted transcripts left".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
