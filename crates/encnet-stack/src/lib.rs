//! TCP/IP engine for a single SPI Ethernet controller.
//!
//! The engine answers ARP for its own address, accepts inbound TCP connections on registered
//! ports and hands each established connection's segments to the owning application. Frames are
//! never staged on the host: handlers read headers and payload straight out of the controller's
//! receive ring and write responses into its transmit region, patching lengths and checksums in
//! place before sending.

#![forbid(unsafe_code)]

mod arp;
mod ip;
mod link;
mod nic;
mod stack;
mod tcp;

pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod ipconfig;

pub use app::{AppId, AppRegistry, Conn, Peer, TcpApp};
pub use channel::{Channel, ChannelId, ChannelTable};
pub use config::StackConfig;
pub use error::{ConfigError, Result, StackError};
pub use ipconfig::{IpConfig, IpStore, MemoryIpStore, DEFAULT_IP};
pub use stack::{NetStack, PollOutcome, TickHandle};
