/// Data-link layer modules
pub mod framing;
pub mod receiver;
pub mod transmitter;

pub use framing::*;
pub use receiver::*;
pub use transmitter::*;
