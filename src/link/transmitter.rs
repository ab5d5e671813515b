//! Paced chunk transmission over the modem.
//!
//! A message that fits in one chunk leaves synchronously. Longer messages
//! enter the Sending state and a worker thread emits the remaining chunks,
//! one per inter-chunk delay, until the sequence completes, fails, or is
//! cancelled.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::LinkError;
use crate::link::framing::{self, Chunk};
use crate::modem::{Modem, ModemError};
use crate::utils::consts::{INTER_CHUNK_DELAY_MS, MAX_CHUNK_CHARS};

/// Configuration for the transmit session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransmitterConfig {
    pub max_chunk_chars: usize,
    pub inter_chunk_delay_ms: u64,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: MAX_CHUNK_CHARS,
            inter_chunk_delay_ms: INTER_CHUNK_DELAY_MS,
        }
    }
}

impl TransmitterConfig {
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitState {
    Idle,    // No transmission in flight
    Sending, // Chunk sequence in progress
}

/// Progress notifications published while a message is being sent.
#[derive(Debug, Clone)]
pub enum TransmitEvent {
    Started { total_chunks: usize },
    ChunkSent { index: usize, total: usize },
    Completed,
    Cancelled,
    Failed(ModemError),
}

/// Drives sending an entire message over the modem: splits it into chunks,
/// fires the first immediately and paces the rest with a fixed delay
/// measured from the return of the previous transmit call.
pub struct TransmitSession {
    modem: Arc<dyn Modem>,
    config: TransmitterConfig,
    state: Arc<Mutex<TransmitState>>,
    cancel: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    events_tx: Sender<TransmitEvent>,
    events_rx: Receiver<TransmitEvent>,
}

impl TransmitSession {
    pub fn new(modem: Arc<dyn Modem>, config: TransmitterConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            modem,
            config,
            state: Arc::new(Mutex::new(TransmitState::Idle)),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
            events_tx,
            events_rx,
        }
    }

    pub fn new_default(modem: Arc<dyn Modem>) -> Self {
        Self::new(modem, TransmitterConfig::default())
    }

    /// Progress event stream. Intended for a single consumer.
    pub fn events(&self) -> Receiver<TransmitEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> TransmitState {
        *self.state.lock().unwrap()
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }

    /// Submit a message for transmission.
    ///
    /// Fails with `InvalidState` while a chunk sequence is in flight and
    /// with `EmptyInput` for an empty message. The first chunk leaves on
    /// the caller's thread, so a single-chunk message completes before this
    /// returns and a first-chunk modem failure reports synchronously as
    /// `TransmitFailed`. Later failures arrive as `TransmitEvent::Failed`.
    pub fn submit(&self, message: &str) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        if *state == TransmitState::Sending {
            return Err(LinkError::InvalidState("submit while already sending"));
        }
        if message.is_empty() {
            return Err(LinkError::EmptyInput);
        }

        let chunks = framing::split(message, self.config.max_chunk_chars)?;
        let total = chunks.len();

        // Started follows the first successful transmit; a synchronous
        // failure emits no events.
        self.modem
            .transmit(chunks[0].payload.as_bytes())
            .map_err(LinkError::TransmitFailed)?;
        let _ = self.events_tx.send(TransmitEvent::Started { total_chunks: total });
        info!(
            "chunk 1/{} transmitted ({} chars)",
            total,
            chunks[0].payload.chars().count()
        );
        let _ = self.events_tx.send(TransmitEvent::ChunkSent { index: 0, total });

        if total == 1 {
            let _ = self.events_tx.send(TransmitEvent::Completed);
            return Ok(());
        }

        *state = TransmitState::Sending;
        drop(state);

        let (cancel_tx, cancel_rx) = bounded(1);
        *self.cancel.lock().unwrap() = Some(cancel_tx);

        let modem = Arc::clone(&self.modem);
        let session_state = Arc::clone(&self.state);
        let events = self.events_tx.clone();
        let delay = self.config.inter_chunk_delay();
        let rest: Vec<Chunk> = chunks.into_iter().skip(1).collect();

        let handle = thread::spawn(move || {
            run_paced_emission(modem, session_state, events, cancel_rx, rest, delay);
        });
        *self.worker.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Abort a transmission in flight: the pending delayed emission is
    /// cancelled and no further chunks reach the modem. No-op when idle.
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap().take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TransmitSession {
    fn drop(&mut self) {
        // Dropping the cancel sender disconnects the worker's timed wait,
        // which it treats as a cancellation.
        self.cancel.lock().unwrap().take();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn run_paced_emission(
    modem: Arc<dyn Modem>,
    state: Arc<Mutex<TransmitState>>,
    events: Sender<TransmitEvent>,
    cancel: Receiver<()>,
    chunks: Vec<Chunk>,
    delay: Duration,
) {
    for chunk in chunks {
        // The delay doubles as the cancellation point: a cancel signal (or
        // session teardown) wakes the wait immediately.
        match cancel.recv_timeout(delay) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!(
                    "transmission cancelled before chunk {}/{}",
                    chunk.index + 1,
                    chunk.total
                );
                *state.lock().unwrap() = TransmitState::Idle;
                let _ = events.send(TransmitEvent::Cancelled);
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        match modem.transmit(chunk.payload.as_bytes()) {
            Ok(()) => {
                info!(
                    "chunk {}/{} transmitted ({} chars)",
                    chunk.index + 1,
                    chunk.total,
                    chunk.payload.chars().count()
                );
                let _ = events.send(TransmitEvent::ChunkSent {
                    index: chunk.index,
                    total: chunk.total,
                });
            }
            Err(e) => {
                error!(
                    "modem transmit failed on chunk {}/{}: {}",
                    chunk.index + 1,
                    chunk.total,
                    e
                );
                *state.lock().unwrap() = TransmitState::Idle;
                let _ = events.send(TransmitEvent::Failed(e));
                return;
            }
        }
    }

    *state.lock().unwrap() = TransmitState::Idle;
    debug!("all chunks transmitted");
    let _ = events.send(TransmitEvent::Completed);
}
