//! Speech transcription service
//!
//! Recognition is a one-shot request that yields an ordered list of
//! candidate transcripts, a cancellation, or an error. Only the first
//! candidate is ever used.

mod scripted;
mod session;

use async_trait::async_trait;

pub use scripted::ScriptedSpeech;
pub use session::{RequestToken, VoiceSession};

/// Shown when recognition finished without any candidate
pub const NO_TRANSCRIPT_PLACEHOLDER: &str = "Could not recognize speech";

/// Result of one recognition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// Candidate transcripts, best first
    Transcripts(Vec<String>),
    /// The user dismissed the request
    Cancelled,
}

impl Recognition {
    /// Text to display and interpret, or `None` when cancelled
    pub fn transcript(&self) -> Option<&str> {
        match self {
            Recognition::Transcripts(candidates) => Some(
                candidates
                    .first()
                    .map(String::as_str)
                    .unwrap_or(NO_TRANSCRIPT_PLACEHOLDER),
            ),
            Recognition::Cancelled => None,
        }
    }
}

/// Errors raised while launching or running recognition
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpeechError {
    #[error("speech recognition is not available: {0}")]
    NotAvailable(String),

    #[error("recognition failed: {0}")]
    Failed(String),
}

/// Backend that turns one utterance into text
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Request microphone access. Called once at startup; the outcome is
    /// only logged and does not gate [`SpeechService::recognize`].
    async fn prepare(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    /// Listen for one utterance
    async fn recognize(&self) -> Result<Recognition, SpeechError>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_candidate_used() {
        let recognition =
            Recognition::Transcripts(vec!["light on".to_string(), "light off".to_string()]);
        assert_eq!(recognition.transcript(), Some("light on"));
    }

    #[test]
    fn test_empty_candidates_use_placeholder() {
        let recognition = Recognition::Transcripts(Vec::new());
        assert_eq!(recognition.transcript(), Some(NO_TRANSCRIPT_PLACEHOLDER));
    }

    #[test]
    fn test_cancelled_has_no_transcript() {
        assert_eq!(Recognition::Cancelled.transcript(), None);
    }
}
