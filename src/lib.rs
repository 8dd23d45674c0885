//! TCP/IP for an ENC28J60-class SPI Ethernet controller.
//!
//! This package only re-exports the workspace crates:
//!
//! - [`wire`]: Ethernet, ARP, IPv4 and TCP records, frame builders and the Internet checksum.
//! - [`chip`]: the SPI bus boundary, register/bank driver and packet buffer streams.
//! - [`stack`]: ARP responder, IPv4 receive path, TCP engine and the poll loop.
//!
//! A board brings its own [`chip::SpiBus`] and [`stack::IpStore`] implementations, registers
//! [`stack::TcpApp`]s and calls [`stack::NetStack::poll`] from its main loop.

#![forbid(unsafe_code)]

pub use encnet_chip as chip;
pub use encnet_stack as stack;
pub use encnet_wire as wire;

pub use encnet_chip::{ChipConfig, ChipError, Enc28j60, SpinLimit, SpiBus};
pub use encnet_stack::{
    Conn, IpStore, MemoryIpStore, NetStack, PollOutcome, StackConfig, StackError, TcpApp,
    TickHandle,
};
