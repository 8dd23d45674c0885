//! Fixed-layout wire records for the small Ethernet/ARP/IPv4/TCP stack.
//!
//! Every record here mirrors the on-wire byte layout exactly (big-endian, no padding). They are
//! read and written as whole `[u8; LEN]` arrays because the packet data lives in controller memory
//! and is only ever streamed, never held as a complete frame.
#![forbid(unsafe_code)]

pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod frame;
pub mod ipv4;
pub mod tcp;

pub use arp::{ArpPacket, ARP_OP_REPLY, ARP_OP_REQUEST, HTYPE_ETHERNET};
pub use checksum::Checksum;
pub use ethernet::{EthernetHeader, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};
pub use frame::{TcpFrame, TcpFrameBuilder};
pub use ipv4::{Ipv4Header, IPPROTO_TCP};
pub use tcp::{TcpFlags, TcpHeader};

pub use core::net::Ipv4Addr;

#[inline]
pub(crate) fn be16(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

#[inline]
pub(crate) fn be32(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline]
pub(crate) fn ip_at(b: &[u8], at: usize) -> Ipv4Addr {
    Ipv4Addr::new(b[at], b[at + 1], b[at + 2], b[at + 3])
}

#[inline]
pub(crate) fn mac_at(b: &[u8], at: usize) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&b[at..at + 6]);
    MacAddr(mac)
}
