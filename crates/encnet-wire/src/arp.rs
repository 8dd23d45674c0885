use core::net::Ipv4Addr;

use crate::ethernet::{MacAddr, ETHERTYPE_IPV4};
use crate::{be16, ip_at, mac_at};

pub const HTYPE_ETHERNET: u16 = 1;
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

/// Ethernet/IPv4 ARP payload (28 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub htype: u16,
    pub ptype: u16,
    pub hlen: u8,
    pub plen: u8,
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub const LEN: usize = 28;

    pub fn from_bytes(b: &[u8; Self::LEN]) -> Self {
        Self {
            htype: be16(b, 0),
            ptype: be16(b, 2),
            hlen: b[4],
            plen: b[5],
            opcode: be16(b, 6),
            sender_mac: mac_at(b, 8),
            sender_ip: ip_at(b, 14),
            target_mac: mac_at(b, 18),
            target_ip: ip_at(b, 24),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..2].copy_from_slice(&self.htype.to_be_bytes());
        out[2..4].copy_from_slice(&self.ptype.to_be_bytes());
        out[4] = self.hlen;
        out[5] = self.plen;
        out[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        out[8..14].copy_from_slice(&self.sender_mac.0);
        out[14..18].copy_from_slice(&self.sender_ip.octets());
        out[18..24].copy_from_slice(&self.target_mac.0);
        out[24..28].copy_from_slice(&self.target_ip.octets());
        out
    }

    /// A request for `target_ip`, as a peer would send it.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: ETHERTYPE_IPV4,
            hlen: 6,
            plen: 4,
            opcode: ARP_OP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::default(),
            target_ip,
        }
    }

    /// Ethernet hardware, IPv4 protocol, opcode request.
    ///
    /// The hardware type field is not checked; only the protocol and size fields are.
    pub fn is_ipv4_request(&self) -> bool {
        self.ptype == ETHERTYPE_IPV4
            && self.hlen == 6
            && self.plen == 4
            && self.opcode == ARP_OP_REQUEST
    }

    /// Turns a request into the matching reply from `(my_mac, my_ip)`.
    pub fn into_reply(self, my_mac: MacAddr, my_ip: Ipv4Addr) -> Self {
        Self {
            opcode: ARP_OP_REPLY,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
            sender_mac: my_mac,
            sender_ip: my_ip,
            ..self
        }
    }
}
