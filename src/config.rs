//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::device::{Device, DeviceState};

/// Overrides the IPC socket path
pub const SOCKET_ENV: &str = "HOME_PANEL_SOCKET";
/// Initial store contents, e.g. `door=closed,light=off`
pub const SEED_ENV: &str = "HOME_PANEL_SEED";
/// `|`-separated transcripts replayed by the scripted recognizer.
/// `<cancel>`, `<silence>` and `<error>` script the other outcomes.
pub const TRANSCRIPTS_ENV: &str = "HOME_PANEL_TRANSCRIPTS";
/// Simulated listening time of the scripted recognizer, in milliseconds
pub const SPEECH_LATENCY_ENV: &str = "HOME_PANEL_SPEECH_LATENCY_MS";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Device states the store starts with
    pub seed: Vec<(Device, DeviceState)>,

    /// Transcripts the scripted recognizer replays, one per voice request
    pub transcripts: Vec<String>,

    /// Delay before each scripted recognition result
    pub speech_latency: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("home-panel");

        let socket_path = lookup(SOCKET_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let seed = match lookup(SEED_ENV) {
            Some(raw) => parse_seed(&raw)?,
            None => Vec::new(),
        };

        let transcripts = lookup(TRANSCRIPTS_ENV)
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let speech_latency = match lookup(SPEECH_LATENCY_ENV) {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("invalid {}: {:?}", SPEECH_LATENCY_ENV, raw))?,
            ),
            None => Duration::ZERO,
        };

        Ok(Self {
            socket_path,
            data_dir,
            seed,
            transcripts,
            speech_latency,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Parse `device=state` pairs separated by commas
fn parse_seed(raw: &str) -> Result<Vec<(Device, DeviceState)>> {
    let mut seed = Vec::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("invalid seed entry {:?}, expected device=state", pair);
        };
        let device: Device = name.trim().parse()?;
        let Some(state) = device.parse_state(value.trim()) else {
            bail!("invalid state {:?} for {}", value.trim(), device);
        };
        seed.push((device, state));
    }

    Ok(seed)
}
