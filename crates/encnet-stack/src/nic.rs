//! Outbound side of the engine: the controller plus the addressing needed to frame segments.
//!
//! A segment is written front to back straight into the controller's transmit region. The IP
//! total length, IP checksum and TCP checksum depend on what follows the headers, so they are
//! written as zero and patched through transmit marks once the payload is in place.

use encnet_chip::{Enc28j60, SpiBus, TxMark};
use encnet_wire::checksum::pseudo_header;
use encnet_wire::{
    Checksum, EthernetHeader, Ipv4Addr, Ipv4Header, MacAddr, TcpFlags, TcpHeader, ETHERTYPE_IPV4,
    IPPROTO_TCP,
};
use tracing::{trace, warn};

use crate::channel::Channel;
use crate::error::Result;

/// Positions and partial sums of the segment currently being written.
#[derive(Debug, Clone, Copy)]
struct OpenSegment {
    ip_start: TxMark,
    tcp_start: TxMark,
    /// Sum over the IP header as written, i.e. without the total length.
    ip_sum: Checksum,
    /// TCP pseudo-header sum without the length term.
    pseudo: Checksum,
}

const HEADERS_LEN: u16 = (Ipv4Header::LEN + TcpHeader::LEN) as u16;

pub struct Nic<B> {
    chip: Enc28j60<B>,
    ip: Ipv4Addr,
    ttl: u8,
    window: u16,
    open: Option<OpenSegment>,
}

impl<B: SpiBus> Nic<B> {
    pub(crate) fn new(chip: Enc28j60<B>, ip: Ipv4Addr, ttl: u8, window: u16) -> Self {
        Self {
            chip,
            ip,
            ttl,
            window,
            open: None,
        }
    }

    pub fn chip(&self) -> &Enc28j60<B> {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut Enc28j60<B> {
        &mut self.chip
    }

    pub fn into_chip(self) -> Enc28j60<B> {
        self.chip
    }

    pub fn mac(&self) -> MacAddr {
        self.chip.mac()
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub(crate) fn set_ip(&mut self, ip: Ipv4Addr) {
        self.ip = ip;
    }

    /// Opens a fresh frame and writes the Ethernet, IP and TCP headers for `ch`.
    pub fn begin_segment(&mut self, ch: &Channel, flags: TcpFlags) {
        if self.open.is_some() {
            warn!(peer_port = ch.peer_port, "discarding unfinished segment");
        }
        self.chip.tx().start_package();
        self.open = Some(self.write_headers(ch, flags));
    }

    fn write_headers(&mut self, ch: &Channel, flags: TcpFlags) -> OpenSegment {
        let eth = EthernetHeader {
            dst: ch.peer_mac,
            src: self.chip.mac(),
            ethertype: ETHERTYPE_IPV4,
        };
        let ip = Ipv4Header::outbound(self.ip, ch.peer_ip, IPPROTO_TCP, self.ttl);
        let tcp = TcpHeader {
            src_port: ch.local_port,
            dst_port: ch.peer_port,
            seq: ch.seq,
            ack: if flags.contains(TcpFlags::ACK) { ch.ack } else { 0 },
            data_offset: 5,
            flags,
            window: self.window,
            checksum: 0,
            urgent: 0,
        };

        let mut tx = self.chip.tx();
        tx.write_all(&eth.to_bytes());
        let ip_start = tx.mark();
        tx.write_all(&ip.to_bytes());
        let tcp_start = tx.mark();
        tx.write_all(&tcp.to_bytes());
        trace!(?flags, seq = ch.seq, ack = tcp.ack, "segment headers written");

        OpenSegment {
            ip_start,
            tcp_start,
            ip_sum: ip.partial_checksum(),
            pseudo: pseudo_header(self.ip, ch.peer_ip, IPPROTO_TCP),
        }
    }

    /// Patches the length and checksums of the open segment, sends it and advances `ch.seq` by
    /// the payload carried.
    pub fn finish_segment(&mut self, ch: &mut Channel) -> Result<()> {
        let Some(seg) = self.open.take() else {
            warn!(peer_port = ch.peer_port, "finish without an open segment");
            return Ok(());
        };

        let mut tx = self.chip.tx();
        let end = tx.mark();
        let total_len = end.get().saturating_sub(seg.ip_start.get());

        tx.set_pointer_offset(seg.ip_start, Ipv4Header::TOTAL_LEN_OFFSET as u16);
        tx.write_u16_be(total_len);
        let mut ip_sum = seg.ip_sum;
        ip_sum.add_u16(total_len);
        tx.set_pointer_offset(seg.ip_start, Ipv4Header::CHECKSUM_OFFSET as u16);
        tx.write_u16_be(ip_sum.finish());
        tx.set_pointer(end);

        self.chip.compute_tcp_checksum(seg.pseudo, seg.tcp_start);
        self.chip.tx().send()?;

        let payload = total_len.saturating_sub(HEADERS_LEN);
        ch.seq = ch.seq.wrapping_add(payload as u32);
        trace!(total_len, payload, seq = ch.seq, "segment sent");
        Ok(())
    }

    /// Header-only segment: SYN+ACK, bare ACK, keep-alive or FIN.
    pub fn send_control(&mut self, ch: &mut Channel, flags: TcpFlags) -> Result<()> {
        self.begin_segment(ch, flags);
        self.finish_segment(ch)
    }

    /// Sends the payload of the frame that was just transmitted again, addressed to `ch`.
    ///
    /// The headers have a fixed size, so rewriting them in place leaves the payload untouched.
    pub fn resend_segment(&mut self, ch: &mut Channel, flags: TcpFlags) -> Result<()> {
        let Some(end) = self.chip.tx().last_sent_mark() else {
            warn!(peer_port = ch.peer_port, "nothing sent yet to resend");
            return Ok(());
        };
        if end.get() < EthernetHeader::LEN as u16 + HEADERS_LEN {
            warn!(len = end.get(), "last frame too short to carry a segment");
            return Ok(());
        }
        self.chip.tx().restart_package();
        let seg = self.write_headers(ch, flags);
        self.chip.tx().set_pointer(end);
        self.open = Some(seg);
        self.finish_segment(ch)
    }
}
