//! Panel view-model and its event loop
//!
//! All mutable panel state is owned by [`PanelViewModel`] and only touched
//! from [`PanelViewModel::run`]. Store writes and recognition requests run
//! as spawned tasks that report back to the loop over an internal channel.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::command::{self, Action};
use crate::device::{Device, DeviceState};
use crate::events::PanelEvent;
use crate::speech::{Recognition, RequestToken, SpeechError, SpeechService, VoiceSession};
use crate::store::{DeviceStore, StoreError, StoreRecord};

use super::snapshot::DeviceSnapshot;

/// Text shown before the first voice request
pub const IDLE_PROMPT: &str = "Press the button and speak...";

/// Intents forwarded by a panel client
#[derive(Debug, Clone)]
pub enum PanelCommand {
    /// A device switch was flipped
    Toggle { device: Device, checked: bool },
    /// Start listening through the configured speech service
    StartVoiceCommand,
    /// A recognition result produced on the client side
    SubmitRecognition(Recognition),
}

/// Completions reported by tasks the view-model spawned
#[derive(Debug)]
enum Completion {
    Recognition {
        token: RequestToken,
        outcome: Result<Recognition, SpeechError>,
    },
    Write {
        device: Device,
        state: DeviceState,
        result: Result<(), StoreError>,
    },
}

pub struct PanelViewModel {
    snapshot: DeviceSnapshot,
    recognized_text: String,
    last_error: Option<String>,
    session: VoiceSession,
    store: Arc<dyn DeviceStore>,
    speech: Arc<dyn SpeechService>,
    event_tx: broadcast::Sender<PanelEvent>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: Option<mpsc::Receiver<Completion>>,
}

impl PanelViewModel {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        speech: Arc<dyn SpeechService>,
        event_tx: broadcast::Sender<PanelEvent>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(32);
        Self {
            snapshot: DeviceSnapshot::new(),
            recognized_text: IDLE_PROMPT.to_string(),
            last_error: None,
            session: VoiceSession::new(),
            store,
            speech,
            event_tx,
            completion_tx,
            completion_rx: Some(completion_rx),
        }
    }

    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    pub fn recognized_text(&self) -> &str {
        &self.recognized_text
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Run the event loop until the command channel or the store closes
    pub async fn run(&mut self, mut command_rx: mpsc::Receiver<PanelCommand>) {
        let Some(mut completion_rx) = self.completion_rx.take() else {
            warn!("panel view-model is already running");
            return;
        };

        // Subscribe before the initial read so no change falls in between
        let mut store_rx = self.store.subscribe();
        match self.store.get().await {
            Ok(record) => self.apply_record(&record),
            Err(e) => warn!(%e, "initial store read failed, readings stay Unknown"),
        }

        for (device, reading) in self.snapshot.iter() {
            debug!(%device, %reading, "initial reading");
        }
        info!("panel view-model started");

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                record = store_rx.recv() => match record {
                    Ok(record) => self.apply_record(&record),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "store notifications lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                Some(completion) = completion_rx.recv() => {
                    self.handle_completion(completion);
                }
            }
        }

        self.session.cancel();
        self.completion_rx = Some(completion_rx);
        info!("panel view-model stopped");
    }

    /// Handle one client intent
    fn handle_command(&mut self, command: PanelCommand) {
        debug!(?command, "panel command");
        match command {
            PanelCommand::Toggle { device, checked } => {
                self.write(device, device.toggle_value(checked));
            }
            PanelCommand::StartVoiceCommand => self.start_recognition(),
            PanelCommand::SubmitRecognition(recognition) => {
                // Supersedes anything the speech service is still doing
                self.session.cancel();
                self.apply_recognition(recognition);
            }
        }
    }

    /// Apply a store notification; the only path that changes readings
    fn apply_record(&mut self, record: &StoreRecord) {
        for (device, reading) in self.snapshot.apply(record) {
            info!(%device, %reading, "device reading confirmed");
            self.emit(PanelEvent::DeviceChanged {
                device,
                value: reading.to_string(),
                checked: reading.is_checked(device),
            });
        }
    }

    /// Issue a fire-and-forget store write
    fn write(&self, device: Device, state: DeviceState) {
        info!(%device, %state, "writing device state");

        let store = Arc::clone(&self.store);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = store.set(device, state.as_str()).await;
            let _ = completion_tx
                .send(Completion::Write {
                    device,
                    state,
                    result,
                })
                .await;
        });
    }

    fn start_recognition(&mut self) {
        let replacing = self.session.is_pending();
        let token = self.session.begin();
        info!(
            request_id = token.id(),
            speech = self.speech.name(),
            replacing,
            "starting voice request"
        );
        self.emit(PanelEvent::VoiceRequestStarted {
            request_id: token.id(),
        });

        let speech = Arc::clone(&self.speech);
        let completion_tx = self.completion_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = speech.recognize().await;
            let _ = completion_tx
                .send(Completion::Recognition { token, outcome })
                .await;
        });
        self.session.attach(token, task);
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Recognition { token, outcome } => {
                if !self.session.complete(token) {
                    return;
                }
                match outcome {
                    Ok(recognition) => {
                        if recognition.transcript().is_none() {
                            self.emit(PanelEvent::VoiceRequestEnded {
                                request_id: token.id(),
                            });
                        }
                        self.apply_recognition(recognition);
                    }
                    Err(e) => {
                        warn!(%e, request_id = token.id(), "voice request failed");
                        let message = format!("Error: {}", e);
                        self.last_error = Some(message.clone());
                        self.emit(PanelEvent::SpeechFailed { message });
                        self.emit(PanelEvent::VoiceRequestEnded {
                            request_id: token.id(),
                        });
                    }
                }
            }
            Completion::Write {
                device,
                state,
                result,
            } => match result {
                Ok(()) => debug!(%device, %state, "store accepted write"),
                Err(e) => {
                    warn!(%device, %state, %e, "store write failed");
                    let message = e.to_string();
                    self.last_error = Some(message.clone());
                    self.emit(PanelEvent::WriteFailed {
                        device,
                        value: state.to_string(),
                        message,
                    });
                }
            },
        }
    }

    /// Display the transcript and dispatch any command it contains
    fn apply_recognition(&mut self, recognition: Recognition) {
        let Some(text) = recognition.transcript() else {
            debug!("voice request cancelled");
            return;
        };

        info!(text, "transcript recognized");
        self.recognized_text = text.to_string();
        self.emit(PanelEvent::TranscriptRecognized {
            text: text.to_string(),
        });

        match command::interpret(text) {
            Some(Action { device, state }) => self.write(device, state),
            None => debug!(text, "no command matched"),
        }
    }

    fn emit(&self, event: PanelEvent) {
        debug!(%event, "emitting panel event");
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }
}
