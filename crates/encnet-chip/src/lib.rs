//! Driver for an SPI-attached ENC28J60-class Ethernet controller.
//!
//! The controller keeps received packets in a ring inside its own buffer memory and transmits from
//! a second region of the same memory. This crate exposes that memory as two cursors: a reader
//! over the packet at the head of the ring and a writer for the outbound frame. Both stream over
//! the bus without staging whole frames on the host.

#![forbid(unsafe_code)]

pub mod bus;
pub mod chip;
pub mod config;
pub mod driver;
pub mod error;
pub mod regs;
pub mod stream;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use bus::{SpiBus, Transaction};
pub use chip::Enc28j60;
pub use config::{ChipConfig, SpinLimit};
pub use driver::Registers;
pub use error::{ChipError, Result};
pub use stream::{InboundPacket, RxPointer, RxStream, TxMark, TxStream};
