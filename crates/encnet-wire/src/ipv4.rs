use core::net::Ipv4Addr;

use crate::checksum::Checksum;
use crate::{be16, ip_at};

pub const IPPROTO_TCP: u8 = 6;

/// Fixed 20-byte IPv4 header. Options are never emitted; on receive they are skipped by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub dscp_ecn: u8,
    pub total_len: u16,
    pub identification: u16,
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub const LEN: usize = 20;
    pub const TOTAL_LEN_OFFSET: usize = 2;
    pub const CHECKSUM_OFFSET: usize = 10;

    /// Outbound header: version 4, IHL 5, no fragmentation, length and checksum left zero for
    /// later patching.
    pub fn outbound(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, ttl: u8) -> Self {
        Self {
            version_ihl: 0x45,
            dscp_ecn: 0,
            total_len: 0,
            identification: 0,
            flags_fragment: 0,
            ttl,
            protocol,
            checksum: 0,
            src,
            dst,
        }
    }

    pub fn from_bytes(b: &[u8; Self::LEN]) -> Self {
        Self {
            version_ihl: b[0],
            dscp_ecn: b[1],
            total_len: be16(b, 2),
            identification: be16(b, 4),
            flags_fragment: be16(b, 6),
            ttl: b[8],
            protocol: b[9],
            checksum: be16(b, 10),
            src: ip_at(b, 12),
            dst: ip_at(b, 16),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.version_ihl;
        out[1] = self.dscp_ecn;
        out[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        out[4..6].copy_from_slice(&self.identification.to_be_bytes());
        out[6..8].copy_from_slice(&self.flags_fragment.to_be_bytes());
        out[8] = self.ttl;
        out[9] = self.protocol;
        out[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        out[12..16].copy_from_slice(&self.src.octets());
        out[16..20].copy_from_slice(&self.dst.octets());
        out
    }

    /// Header length in bytes as declared by the IHL nibble.
    pub fn header_len(&self) -> usize {
        ((self.version_ihl & 0x0f) as usize) * 4
    }

    /// Sum over the header as written, so a later length patch only needs one more word.
    pub fn partial_checksum(&self) -> Checksum {
        let mut sum = Checksum::new();
        sum.add_bytes(&self.to_bytes());
        sum
    }
}
