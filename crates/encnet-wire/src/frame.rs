//! Whole-frame builders and parsers for hosts that hold a frame in memory, such as a peer talking
//! to the stack or a capture being inspected.

use core::net::Ipv4Addr;

use crate::checksum::{self, pseudo_header, Checksum};
use crate::{
    ArpPacket, EthernetHeader, Ipv4Header, MacAddr, TcpFlags, TcpHeader, ETHERTYPE_ARP,
    ETHERTYPE_IPV4, IPPROTO_TCP,
};

/// Shortest Ethernet frame without the CRC; shorter frames are zero-padded.
pub const MIN_FRAME_LEN: usize = 60;

/// Ethernet + IPv4 + TCP frame description. Options must be a multiple of four bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFrameBuilder<'a> {
    pub eth_dst: MacAddr,
    pub eth_src: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
    pub window: u16,
    pub ttl: u8,
    pub ip_options: &'a [u8],
    pub tcp_options: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> TcpFrameBuilder<'a> {
    pub fn new(eth_src: MacAddr, eth_dst: MacAddr, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Self {
        Self {
            eth_dst,
            eth_src,
            src_ip,
            dst_ip,
            src_port: 0,
            dst_port: 0,
            seq: 0,
            ack: 0,
            flags: TcpFlags::empty(),
            window: 1024,
            ttl: 64,
            ip_options: &[],
            tcp_options: &[],
            payload: &[],
        }
    }

    /// Serializes with both checksums filled in, padded to [`MIN_FRAME_LEN`].
    pub fn build_vec(&self) -> Vec<u8> {
        let tcp_len = TcpHeader::LEN + self.tcp_options.len();
        let mut tcp = TcpHeader {
            src_port: self.src_port,
            dst_port: self.dst_port,
            seq: self.seq,
            ack: self.ack,
            data_offset: (tcp_len / 4) as u8,
            flags: self.flags,
            window: self.window,
            checksum: 0,
            urgent: 0,
        };
        let mut segment = Vec::with_capacity(tcp_len + self.payload.len());
        segment.extend_from_slice(&tcp.to_bytes());
        segment.extend_from_slice(self.tcp_options);
        segment.extend_from_slice(self.payload);
        let mut sum = pseudo_header(self.src_ip, self.dst_ip, IPPROTO_TCP);
        sum.add_u16(segment.len() as u16);
        sum.add_bytes(&segment);
        tcp.checksum = sum.finish();
        segment[..TcpHeader::LEN].copy_from_slice(&tcp.to_bytes());

        let ip_len = Ipv4Header::LEN + self.ip_options.len();
        let mut ip = Ipv4Header::outbound(self.src_ip, self.dst_ip, IPPROTO_TCP, self.ttl);
        ip.version_ihl = 0x40 | (ip_len / 4) as u8;
        ip.total_len = (ip_len + segment.len()) as u16;
        let mut ip_bytes = ip.to_bytes().to_vec();
        ip_bytes.extend_from_slice(self.ip_options);
        let mut ip_sum = Checksum::new();
        ip_sum.add_bytes(&ip_bytes);
        let c = ip_sum.finish().to_be_bytes();
        ip_bytes[Ipv4Header::CHECKSUM_OFFSET..Ipv4Header::CHECKSUM_OFFSET + 2].copy_from_slice(&c);

        let eth = EthernetHeader {
            dst: self.eth_dst,
            src: self.eth_src,
            ethertype: ETHERTYPE_IPV4,
        };
        let mut frame = eth.to_bytes().to_vec();
        frame.extend_from_slice(&ip_bytes);
        frame.extend_from_slice(&segment);
        pad(frame)
    }
}

/// Ethernet frame carrying an ARP request for `target_ip`, sent to `dst`.
pub fn arp_request_frame(
    dst: MacAddr,
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    let eth = EthernetHeader {
        dst,
        src: sender_mac,
        ethertype: ETHERTYPE_ARP,
    };
    let mut frame = eth.to_bytes().to_vec();
    frame.extend_from_slice(&ArpPacket::request(sender_mac, sender_ip, target_ip).to_bytes());
    pad(frame)
}

/// ARP payload of an Ethernet frame, if it is one.
pub fn parse_arp_frame(frame: &[u8]) -> Option<(EthernetHeader, ArpPacket)> {
    let eth = EthernetHeader::from_bytes(frame.get(..EthernetHeader::LEN)?.try_into().ok()?);
    if eth.ethertype != ETHERTYPE_ARP {
        return None;
    }
    let end = EthernetHeader::LEN + ArpPacket::LEN;
    let arp = ArpPacket::from_bytes(frame.get(EthernetHeader::LEN..end)?.try_into().ok()?);
    Some((eth, arp))
}

/// A parsed TCP frame whose IP header and TCP checksums both verified.
#[derive(Debug, Clone)]
pub struct TcpFrame {
    pub eth: EthernetHeader,
    pub ip: Ipv4Header,
    pub tcp: TcpHeader,
    pub payload: Vec<u8>,
}

impl TcpFrame {
    /// `None` for anything other than a well-formed IPv4 TCP frame with valid checksums.
    /// Trailing padding past the IP total length is ignored.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let eth = EthernetHeader::from_bytes(frame.get(..EthernetHeader::LEN)?.try_into().ok()?);
        if eth.ethertype != ETHERTYPE_IPV4 {
            return None;
        }
        let ip_bytes = &frame[EthernetHeader::LEN..];
        let ip = Ipv4Header::from_bytes(ip_bytes.get(..Ipv4Header::LEN)?.try_into().ok()?);
        let header_len = ip.header_len();
        if ip.protocol != IPPROTO_TCP || header_len < Ipv4Header::LEN {
            return None;
        }
        if !checksum::is_valid(Checksum::new(), ip_bytes.get(..header_len)?) {
            return None;
        }
        let segment = ip_bytes.get(header_len..ip.total_len as usize)?;
        let mut initial = pseudo_header(ip.src, ip.dst, IPPROTO_TCP);
        initial.add_u16(segment.len() as u16);
        if !checksum::is_valid(initial, segment) {
            return None;
        }
        let tcp = TcpHeader::from_bytes(segment.get(..TcpHeader::LEN)?.try_into().ok()?);
        let payload = segment.get(tcp.header_len()..)?.to_vec();
        Some(Self {
            eth,
            ip,
            tcp,
            payload,
        })
    }
}

fn pad(mut frame: Vec<u8>) -> Vec<u8> {
    if frame.len() < MIN_FRAME_LEN {
        frame.resize(MIN_FRAME_LEN, 0);
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 1]);
    const B: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 2]);

    fn builder<'a>() -> TcpFrameBuilder<'a> {
        TcpFrameBuilder::new(A, B, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
    }

    #[test]
    fn short_segment_is_padded_and_parses_back() {
        let mut b = builder();
        b.src_port = 4000;
        b.dst_port = 80;
        b.seq = 7;
        b.flags = TcpFlags::SYN;
        let frame = b.build_vec();
        assert_eq!(frame.len(), MIN_FRAME_LEN);

        let parsed = TcpFrame::parse(&frame).unwrap();
        assert_eq!(parsed.eth.dst, B);
        assert_eq!(parsed.tcp.src_port, 4000);
        assert_eq!(parsed.tcp.seq, 7);
        assert_eq!(parsed.tcp.flags, TcpFlags::SYN);
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn options_shift_the_payload() {
        let mut b = builder();
        b.ip_options = &[1, 1, 1, 0];
        b.tcp_options = &[2, 4, 0x05, 0xb4];
        b.payload = b"hello";
        let parsed = TcpFrame::parse(&b.build_vec()).unwrap();
        assert_eq!(parsed.ip.header_len(), 24);
        assert_eq!(parsed.tcp.header_len(), 24);
        assert_eq!(parsed.payload, b"hello");
    }

    #[test]
    fn corrupted_payload_fails_the_tcp_checksum() {
        let mut b = builder();
        b.payload = b"0123456789abcdef0123456789";
        let mut frame = b.build_vec();
        let last = frame.len() - 1;
        frame[last] ^= 0x40;
        assert!(TcpFrame::parse(&frame).is_none());
    }

    #[test]
    fn arp_frame_is_not_tcp() {
        let frame = arp_request_frame(
            MacAddr::BROADCAST,
            A,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        assert_eq!(frame.len(), MIN_FRAME_LEN);
        assert!(TcpFrame::parse(&frame).is_none());
        let (eth, arp) = parse_arp_frame(&frame).unwrap();
        assert!(eth.dst.is_broadcast());
        assert!(arp.is_ipv4_request());
        assert_eq!(arp.target_ip, Ipv4Addr::new(10, 0, 0, 2));
    }
}
