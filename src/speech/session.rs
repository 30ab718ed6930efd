//! Voice request tracking
//!
//! Only one recognition is active at a time. Starting a new one aborts the
//! previous task, and a late result carrying an old token is ignored.

use tokio::task::JoinHandle;
use tracing::debug;

/// Identifies one recognition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Tracks the single in-flight recognition
#[derive(Default)]
pub struct VoiceSession {
    next_id: u64,
    active: Option<(RequestToken, JoinHandle<()>)>,
}

impl VoiceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new request, superseding any pending one
    pub fn begin(&mut self) -> RequestToken {
        self.cancel();
        self.next_id += 1;
        RequestToken(self.next_id)
    }

    /// Associate the spawned recognition task with its token
    pub fn attach(&mut self, token: RequestToken, task: JoinHandle<()>) {
        if self.next_id == token.0 {
            self.active = Some((token, task));
        } else {
            task.abort();
        }
    }

    /// Claim the result for `token`. Returns false for superseded requests.
    pub fn complete(&mut self, token: RequestToken) -> bool {
        match &self.active {
            Some((active, _)) if *active == token => {
                self.active = None;
                true
            }
            _ => {
                debug!(token = token.0, "discarding superseded recognition result");
                false
            }
        }
    }

    /// Abort the pending request, if any
    pub fn cancel(&mut self) {
        if let Some((token, task)) = self.active.take() {
            debug!(token = token.0, "cancelling pending recognition");
            task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.cancel();
    }
}
