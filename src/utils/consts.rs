/// Log level (overridable via RUST_LOG)
pub const LOG_LEVEL: &str = "info";

/// Maximum characters carried by a single acoustic chunk
pub const MAX_CHUNK_CHARS: usize = 30;

/// Delay between consecutive chunk transmissions (milliseconds), measured
/// from the return of the previous transmit call
pub const INTER_CHUNK_DELAY_MS: u64 = 7000;
