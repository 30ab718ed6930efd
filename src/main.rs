//! home-panel-daemon: Background daemon for a voice-controlled smart-home panel
//!
//! The daemon mirrors three devices (door, light, window) from a device
//! store and provides:
//! - A view-model that only changes readings when the store confirms a write
//! - Switch toggles and voice commands mapped to store writes
//! - IPC server for panel clients, with push notifications
//!
//! The store and the speech recognizer sit behind traits; this binary wires
//! the in-process store and the scripted recognizer.

mod command;
mod config;
mod device;
mod events;
mod ipc;
mod lifecycle;
mod speech;
mod state;
mod store;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::PanelEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::speech::{ScriptedSpeech, SpeechService};
use crate::state::PanelViewModel;
use crate::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "home-panel-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        seeded = config.seed.len(),
        transcripts = config.transcripts.len(),
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // IPC clients -> view-model
    let (command_tx, command_rx) = mpsc::channel(32);
    // View-model -> IPC server and subscribed clients
    let (event_tx, _event_rx) = broadcast::channel::<PanelEvent>(64);

    let store = Arc::new(MemoryStore::with_states(&config.seed));
    let speech: Arc<dyn SpeechService> = Arc::new(
        ScriptedSpeech::new(config.transcripts.clone()).with_latency(config.speech_latency),
    );

    // Microphone permission is requested once; the outcome is not checked
    // before later voice requests
    let preparing = Arc::clone(&speech);
    tokio::spawn(async move {
        match preparing.prepare().await {
            Ok(()) => info!(speech = preparing.name(), "speech service prepared"),
            Err(e) => warn!(%e, "speech service preparation failed"),
        }
    });

    let mut view_model = PanelViewModel::new(store, speech, event_tx.clone());

    // Create IPC server
    let server = Server::new(&config.socket_path, command_tx, event_tx.clone())?;

    // Subscribe to panel events for the served status
    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the view-model (store notifications, commands, completions)
        _ = view_model.run(command_rx) => {
            info!("panel view-model exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the served status in step with the view-model
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "panel event");
                        server_for_events.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "panel event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("panel event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    for (device, reading) in view_model.snapshot().iter() {
        info!(%device, %reading, "last confirmed reading");
    }
    info!(
        recognized = view_model.recognized_text(),
        last_error = ?view_model.last_error(),
        "final panel state"
    );

    server.shutdown().await;

    info!("home-panel-daemon stopped");

    Ok(())
}
