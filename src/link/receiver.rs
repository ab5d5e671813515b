//! Continuous acoustic listening and received-text delivery.
//!
//! Every decoded unit is appended to the reassembly buffer, the accumulated
//! text is published to the observer, and the modem is re-armed (finish,
//! then listen again) for the next unit. Reception is unit-at-a-time with a
//! brief listen gap per unit.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use tracing::{debug, error, info};

use crate::error::LinkError;
use crate::link::framing::ReassemblyBuffer;
use crate::modem::Modem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    Idle,      // Not listening
    Listening, // Modem armed, decoded units flowing
}

/// Drives one receive direction of the data link.
pub struct ReceiveSession {
    modem: Arc<dyn Modem>,
    state: Arc<Mutex<ReceiveState>>,
    buffer: Arc<Mutex<ReassemblyBuffer>>,
    stop: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    observations_tx: Sender<String>,
    observations_rx: Receiver<String>,
}

impl ReceiveSession {
    pub fn new(modem: Arc<dyn Modem>) -> Self {
        let (observations_tx, observations_rx) = unbounded();
        Self {
            modem,
            state: Arc::new(Mutex::new(ReceiveState::Idle)),
            buffer: Arc::new(Mutex::new(ReassemblyBuffer::new())),
            stop: Mutex::new(None),
            worker: Mutex::new(None),
            observations_tx,
            observations_rx,
        }
    }

    /// Stream of "current received text" snapshots, one per decoded unit.
    /// Intended for a single consumer.
    pub fn observations(&self) -> Receiver<String> {
        self.observations_rx.clone()
    }

    pub fn state(&self) -> ReceiveState {
        *self.state.lock().unwrap()
    }

    /// Text accumulated so far. Survives stop/start cycles.
    pub fn received_text(&self) -> String {
        self.buffer.lock().unwrap().snapshot()
    }

    /// Drop all accumulated text.
    pub fn clear_received(&self) {
        self.buffer.lock().unwrap().clear();
    }

    /// Begin listening. Fails with `InvalidState` if already listening.
    pub fn start(&self) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        if *state == ReceiveState::Listening {
            return Err(LinkError::InvalidState("already listening"));
        }

        let (units_tx, units_rx) = unbounded::<String>();
        self.modem.set_sensor(Box::new(move |unit| {
            let _ = units_tx.send(unit);
        }));
        self.modem.listen()?;
        *state = ReceiveState::Listening;

        let (stop_tx, stop_rx) = bounded(1);
        *self.stop.lock().unwrap() = Some(stop_tx);

        let modem = Arc::clone(&self.modem);
        let session_state = Arc::clone(&self.state);
        let buffer = Arc::clone(&self.buffer);
        let observations = self.observations_tx.clone();
        let handle = thread::spawn(move || {
            run_listen_cycle(modem, session_state, buffer, observations, units_rx, stop_rx);
        });
        *self.worker.lock().unwrap() = Some(handle);

        info!("listening started");
        Ok(())
    }

    /// Stop listening and transition to Idle. Fails with `InvalidState`
    /// when idle. The reassembly buffer is preserved.
    pub fn stop(&self) -> Result<(), LinkError> {
        {
            let state = self.state.lock().unwrap();
            if *state == ReceiveState::Idle {
                return Err(LinkError::InvalidState("not listening"));
            }
        }

        if let Some(stop) = self.stop.lock().unwrap().take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        *self.state.lock().unwrap() = ReceiveState::Idle;

        info!("listening stopped");
        Ok(())
    }
}

impl Drop for ReceiveSession {
    fn drop(&mut self) {
        if self.state() == ReceiveState::Listening {
            let _ = self.stop();
        }
    }
}

fn run_listen_cycle(
    modem: Arc<dyn Modem>,
    state: Arc<Mutex<ReceiveState>>,
    buffer: Arc<Mutex<ReassemblyBuffer>>,
    observations: Sender<String>,
    units: Receiver<String>,
    stop: Receiver<()>,
) {
    loop {
        // Stop wins over queued units.
        if stop.try_recv().is_ok() {
            modem.finish();
            return; // stop() owns the state transition
        }

        select! {
            recv(stop) -> _ => {
                modem.finish();
                return;
            }
            recv(units) -> unit => {
                let unit = match unit {
                    Ok(unit) => unit,
                    Err(_) => return, // sensor replaced, channel gone
                };

                let text = {
                    let mut buffer = buffer.lock().unwrap();
                    buffer.append(&unit);
                    buffer.snapshot()
                };
                debug!(
                    "decoded unit ({} chars), {} chars total",
                    unit.chars().count(),
                    text.chars().count()
                );
                let _ = observations.send(text);

                // Re-arm for the next unit: finish, then listen again.
                modem.finish();
                if let Err(e) = modem.listen() {
                    error!("failed to re-arm listening: {}", e);
                    *state.lock().unwrap() = ReceiveState::Idle;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::{AcousticSensor, ModemError};
    use std::time::Duration;

    /// Modem whose decoded units are pushed by the test. `deliver` waits
    /// for the session's re-arm cycle before invoking the sensor, the way
    /// a real transceiver only decodes while listening.
    struct ScriptedModem {
        inner: Mutex<ScriptedInner>,
    }

    #[derive(Default)]
    struct ScriptedInner {
        sensor: Option<AcousticSensor>,
        listening: bool,
        listen_calls: usize,
        finish_calls: usize,
    }

    impl ScriptedModem {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: Mutex::new(ScriptedInner::default()),
            })
        }

        fn deliver(&self, unit: &str) {
            for _ in 0..1000 {
                {
                    let mut inner = self.inner.lock().unwrap();
                    if inner.listening {
                        if let Some(sensor) = inner.sensor.as_mut() {
                            sensor(unit.to_string());
                        }
                        return;
                    }
                }
                thread::sleep(Duration::from_millis(1));
            }
            panic!("modem never re-armed for listening");
        }

        fn listen_calls(&self) -> usize {
            self.inner.lock().unwrap().listen_calls
        }

        fn finish_calls(&self) -> usize {
            self.inner.lock().unwrap().finish_calls
        }
    }

    impl Modem for ScriptedModem {
        fn transmit(&self, _payload: &[u8]) -> Result<(), ModemError> {
            Ok(())
        }

        fn listen(&self) -> Result<(), ModemError> {
            let mut inner = self.inner.lock().unwrap();
            inner.listening = true;
            inner.listen_calls += 1;
            Ok(())
        }

        fn finish(&self) {
            let mut inner = self.inner.lock().unwrap();
            inner.listening = false;
            inner.finish_calls += 1;
        }

        fn set_sensor(&self, sensor: AcousticSensor) {
            self.inner.lock().unwrap().sensor = Some(sensor);
        }
    }

    #[test]
    fn test_units_accumulate_and_rearm_per_unit() {
        let modem = ScriptedModem::new();
        let session = ReceiveSession::new(modem.clone());
        let observations = session.observations();

        session.start().unwrap();
        assert_eq!(session.state(), ReceiveState::Listening);
        assert_eq!(modem.listen_calls(), 1);

        modem.deliver("He");
        let text = observations.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(text, "He");

        modem.deliver("llo");
        let text = observations.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(text, "Hello");

        assert_eq!(session.received_text(), "Hello");

        session.stop().unwrap();
        assert_eq!(session.state(), ReceiveState::Idle);

        // One listen at start plus one per delivered unit; one finish per
        // unit plus the final stop.
        assert_eq!(modem.listen_calls(), 3);
        assert_eq!(modem.finish_calls(), 3);
    }

    #[test]
    fn test_start_twice_rejected() {
        let modem = ScriptedModem::new();
        let session = ReceiveSession::new(modem.clone());

        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(LinkError::InvalidState(_))
        ));

        session.stop().unwrap();
    }

    #[test]
    fn test_stop_when_idle_rejected() {
        let modem = ScriptedModem::new();
        let session = ReceiveSession::new(modem.clone());

        assert!(matches!(session.stop(), Err(LinkError::InvalidState(_))));
    }

    #[test]
    fn test_buffer_survives_stop_start_cycle() {
        let modem = ScriptedModem::new();
        let session = ReceiveSession::new(modem.clone());
        let observations = session.observations();

        session.start().unwrap();
        modem.deliver("He");
        observations.recv_timeout(Duration::from_secs(1)).unwrap();
        session.stop().unwrap();

        assert_eq!(session.received_text(), "He");

        session.start().unwrap();
        modem.deliver("llo");
        let text = observations.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(text, "Hello");
        session.stop().unwrap();
    }

    #[test]
    fn test_clear_received_empties_buffer() {
        let modem = ScriptedModem::new();
        let session = ReceiveSession::new(modem.clone());
        let observations = session.observations();

        session.start().unwrap();
        modem.deliver("stale");
        observations.recv_timeout(Duration::from_secs(1)).unwrap();
        session.stop().unwrap();

        session.clear_received();
        assert_eq!(session.received_text(), "");
    }
}
