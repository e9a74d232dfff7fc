//! Output side: clock and FIFO of mixed buffers awaiting the device

pub mod clock;
pub mod fifo;

pub use clock::OutputClock;
pub use fifo::{OutputFifo, OutputFifoState};
