use std::sync::{Arc, Mutex};

use tracing::trace;

use super::{AcousticSensor, Modem, ModemError};

/// In-process modem: payloads handed to `transmit` are decoded as UTF-8
/// and delivered straight to the registered sensor while listening. Lets
/// the whole link run without acoustic hardware.
#[derive(Clone, Default)]
pub struct LoopbackModem {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    sensor: Option<AcousticSensor>,
    listening: bool,
}

impl LoopbackModem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Modem for LoopbackModem {
    fn transmit(&self, payload: &[u8]) -> Result<(), ModemError> {
        let unit = String::from_utf8_lossy(payload).into_owned();
        let mut inner = self.inner.lock().unwrap();
        if !inner.listening {
            trace!("loopback: {} bytes dropped, nobody listening", payload.len());
            return Ok(());
        }
        if let Some(sensor) = inner.sensor.as_mut() {
            sensor(unit);
        }
        Ok(())
    }

    fn listen(&self) -> Result<(), ModemError> {
        self.inner.lock().unwrap().listening = true;
        Ok(())
    }

    fn finish(&self) {
        self.inner.lock().unwrap().listening = false;
    }

    fn set_sensor(&self, sensor: AcousticSensor) {
        self.inner.lock().unwrap().sensor = Some(sensor);
    }
}
