use encnet_wire::{Checksum, MacAddr, TcpHeader};
use tracing::{debug, trace, warn};

use crate::bus::SpiBus;
use crate::config::ChipConfig;
use crate::driver::Registers;
use crate::error::Result;
use crate::regs::{self, layout, phy, Econ1, Econ2, Eir, Estat, Macon1, Macon3};
use crate::stream::{InboundPacket, RxCursor, RxStream, TxCursor, TxMark, TxStream};

/// Controller driver: bring-up, packet reception bookkeeping and the two streaming cursors.
pub struct Enc28j60<B> {
    regs: Registers<B>,
    rx: RxCursor,
    tx: TxCursor,
    cfg: ChipConfig,
}

impl<B: SpiBus> Enc28j60<B> {
    /// Resets and configures the controller, leaving reception enabled.
    pub fn init(bus: B, cfg: ChipConfig) -> Result<Self> {
        let mut chip = Self {
            regs: Registers::new(bus, cfg.spin),
            rx: RxCursor::default(),
            tx: TxCursor::default(),
            cfg,
        };
        chip.regs.reset();
        chip.setup_receive_buffer();
        chip.regs.spin_until("oscillator ready", |r| {
            Estat::from_bits_truncate(r.read(regs::ESTAT)).contains(Estat::CLKRDY)
        })?;
        chip.setup_mac()?;

        chip.regs.write(regs::ECON2, Econ2::AUTOINC.bits());
        chip.regs.set_bits(regs::ECON1, Econ1::RXEN.bits());
        debug!(mac = %chip.cfg.mac, "controller initialised");
        Ok(chip)
    }

    fn setup_receive_buffer(&mut self) {
        self.regs.write_u16(regs::ERXSTL, layout::RX_START);
        self.regs.write_u16(regs::ERXNDL, layout::RX_END);
        self.regs.write_u16(regs::ERXRDPTL, layout::RX_START);
        self.regs.write_u16(regs::ERDPTL, layout::RX_START);
    }

    fn setup_mac(&mut self) -> Result<()> {
        let macon1 = Macon1::MARXEN | Macon1::TXPAUS | Macon1::RXPAUS;
        self.regs.write(regs::MACON1, macon1.bits());

        let mut macon3 = Macon3::PADCFG0 | Macon3::TXCRCEN;
        if self.cfg.full_duplex {
            macon3 |= Macon3::FULDPX;
        }
        self.regs.write(regs::MACON3, macon3.bits());
        self.regs.write_u16(regs::MAMXFLL, self.cfg.max_frame_len);

        if self.cfg.full_duplex {
            self.regs.write(regs::MABBIPG, 0x15);
            self.regs.write(regs::MAIPGL, 0x12);
        } else {
            self.regs.write(regs::MABBIPG, 0x12);
            self.regs.write(regs::MAIPGL, 0x12);
            self.regs.write(regs::MAIPGH, 0x0c);
        }

        for (reg, octet) in regs::MAADR.iter().zip(self.cfg.mac.octets()) {
            self.regs.write(*reg, octet);
        }

        let phcon1 = if self.cfg.full_duplex { phy::PHCON1_PDPXMD } else { 0 };
        self.regs.write_phy(phy::PHCON1, phcon1)
    }

    pub fn mac(&self) -> MacAddr {
        self.cfg.mac
    }

    pub fn config(&self) -> &ChipConfig {
        &self.cfg
    }

    pub fn bus(&self) -> &B {
        self.regs.bus()
    }

    pub fn bus_mut(&mut self) -> &mut B {
        self.regs.bus_mut()
    }

    pub fn registers(&mut self) -> &mut Registers<B> {
        &mut self.regs
    }

    pub fn bank_switches(&self) -> u64 {
        self.regs.bank_switches()
    }

    pub fn revision(&mut self) -> u8 {
        self.regs.read(regs::EREVID)
    }

    pub fn link_up(&mut self) -> Result<bool> {
        Ok(self.regs.read_phy(phy::PHSTAT2)? & phy::PHSTAT2_LSTAT != 0)
    }

    /// True while at least one received packet waits in the ring.
    pub fn packet_pending(&mut self) -> bool {
        Eir::from_bits_truncate(self.regs.read(regs::EIR)).contains(Eir::PKTIF)
    }

    /// Reads the per-packet header at ERDPT and arms the receive cursor with the packet length.
    pub fn begin_packet(&mut self) -> InboundPacket {
        let mut header = [0u8; InboundPacket::HEADER_LEN];
        self.regs.read_buffer(&mut header);
        let packet = InboundPacket::from_header(&header);
        self.rx.remaining = packet.len;
        trace!(len = packet.len, next = packet.next.0, "packet received");
        packet
    }

    /// Moves both receive pointers past `packet` and tells the controller one packet was consumed.
    pub fn end_packet(&mut self, packet: InboundPacket) {
        self.rx.remaining = 0;
        self.regs.write_u16(regs::ERDPTL, packet.next.0);
        self.regs.write_u16(regs::ERXRDPTL, packet.next.0);
        self.regs.set_bits(regs::ECON2, Econ2::PKTDEC.bits());
    }

    pub fn rx(&mut self) -> RxStream<'_, B> {
        RxStream {
            regs: &mut self.regs,
            cursor: &mut self.rx,
        }
    }

    pub fn tx(&mut self) -> TxStream<'_, B> {
        TxStream {
            regs: &mut self.regs,
            cursor: &mut self.tx,
        }
    }

    /// Copies inbound bytes straight into the outbound frame until `delim` (consumed, not copied)
    /// or the end of the packet. Returns the number of bytes copied.
    pub fn copy_incoming_to_outgoing(&mut self, delim: u8) -> usize {
        let mut copied = 0;
        while self.rx.remaining > 0 {
            let b = self.rx().read_byte();
            if b == delim {
                break;
            }
            self.tx().write(b);
            copied += 1;
        }
        copied
    }

    /// Computes the TCP checksum of the segment from `segment_start` to the end of the open frame
    /// by reading it back out of buffer memory, and patches it into the header.
    ///
    /// `pseudo` carries the pseudo-header sum without the length term. The checksum field must
    /// still be zero. The read pointer is restored afterwards so an inbound packet being handled
    /// at the same time is unaffected. Returns the patched value.
    pub fn compute_tcp_checksum(&mut self, pseudo: Checksum, segment_start: TxMark) -> u16 {
        let Some(end) = self.tx.len else {
            warn!("checksum requested with no frame open");
            return 0;
        };
        let seg_len = end.saturating_sub(segment_start.get());
        let saved = self.regs.read_u16(regs::ERDPTL);
        self.regs
            .write_u16(regs::ERDPTL, layout::TX_DATA.wrapping_add(segment_start.get()));

        let mut sum = pseudo;
        sum.add_u16(seg_len);
        let mut high: Option<u8> = None;
        self.regs.read_buffer_while(seg_len as usize, |b| {
            match high.take() {
                Some(h) => sum.add_u16(u16::from_be_bytes([h, b])),
                None => high = Some(b),
            }
            true
        });
        if let Some(h) = high {
            sum.add_u16(u16::from_be_bytes([h, 0]));
        }
        let checksum = sum.finish();

        let mut tx = self.tx();
        tx.set_pointer_offset(segment_start, TcpHeader::CHECKSUM_OFFSET as u16);
        tx.write_u16_be(checksum);
        tx.set_pointer(TxMark(end));
        self.regs.write_u16(regs::ERDPTL, saved);
        trace!(seg_len, checksum, "segment checksum patched");
        checksum
    }

    pub fn into_bus(self) -> B {
        self.regs.into_bus()
    }
}
