/// External acoustic transceiver seam
pub mod loopback;

pub use loopback::LoopbackModem;

use thiserror::Error;

/// Failure reported by a concrete modem driver.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModemError(pub String);

/// Callback invoked once per decoded unit while listening. Delivery order
/// matches arrival order on the acoustic channel; the channel is not
/// guaranteed lossless.
pub type AcousticSensor = Box<dyn FnMut(String) + Send>;

/// Acoustic transceiver capability. Implementations own the actual
/// modulation and demodulation; this layer only fires transmissions and
/// consumes decoded units.
pub trait Modem: Send + Sync {
    /// Fire one acoustic transmission. The call returns once the
    /// transmission has been handed to the transceiver; on-air duration is
    /// opaque to the caller.
    fn transmit(&self, payload: &[u8]) -> Result<(), ModemError>;

    /// Begin asynchronous delivery of decoded units to the registered
    /// sensor.
    fn listen(&self) -> Result<(), ModemError>;

    /// Stop listening.
    fn finish(&self);

    /// Register the decoded-unit callback. Replaces any previous sensor.
    fn set_sensor(&self, sensor: AcousticSensor);
}
