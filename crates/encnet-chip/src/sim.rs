//! Behavioural model of the controller, driven through the same byte-level bus interface as the
//! real part.
//!
//! It decodes the SPI command set, keeps the banked register file and the 8 KiB buffer memory,
//! stores injected frames in the receive ring with the per-packet header, and captures frames the
//! driver transmits. Fault knobs make the status bits the driver spins on stay stuck.

use encnet_wire::MacAddr;

use crate::bus::SpiBus;
use crate::regs::{self, layout, Econ1, Econ2, Eir, Estat, Micmd, Mistat, Register};
use crate::stream::InboundPacket;

const BANKED: usize = 0x1b;
const RX_HEADER_LEN: usize = InboundPacket::HEADER_LEN;
const BUFFER_MASK: u16 = (layout::BUFFER_SIZE - 1) as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    ReadControl(u8),
    ReadBuffer,
    WriteControl(u8),
    WriteBuffer,
    BitSet(u8),
    BitClear(u8),
    /// Command complete; further bytes in the frame are ignored.
    Done,
}

/// Stuck-status knobs.
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    /// ESTAT.CLKRDY never sets.
    pub clock_never_ready: bool,
    /// ECON1.TXRTS never clears and nothing is transmitted.
    pub tx_never_completes: bool,
    /// MISTAT.BUSY never clears.
    pub phy_stuck: bool,
}

pub struct SimChip {
    mem: Box<[u8; layout::BUFFER_SIZE]>,
    banks: [[u8; BANKED]; 4],
    eie: u8,
    eir: u8,
    econ2: u8,
    econ1: u8,
    phy: [u16; 0x20],
    phy_busy: bool,
    selected: bool,
    state: State,
    rx_write: u16,
    packets: u8,
    transmitted: Vec<Vec<u8>>,
    transactions: u64,
    commands: Vec<u8>,
    faults: SimFaults,
}

impl Default for SimChip {
    fn default() -> Self {
        Self::new()
    }
}

impl SimChip {
    pub fn new() -> Self {
        let mut chip = Self {
            mem: Box::new([0; layout::BUFFER_SIZE]),
            banks: [[0; BANKED]; 4],
            eie: 0,
            eir: 0,
            econ2: 0,
            econ1: 0,
            phy: [0; 0x20],
            phy_busy: false,
            selected: false,
            state: State::Idle,
            rx_write: 0,
            packets: 0,
            transmitted: Vec::new(),
            transactions: 0,
            commands: Vec::new(),
            faults: SimFaults::default(),
        };
        chip.soft_reset();
        chip
    }

    pub fn faults_mut(&mut self) -> &mut SimFaults {
        &mut self.faults
    }

    /// Completed chip-select windows.
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    /// First byte of every command frame, in order.
    pub fn command_log(&self) -> &[u8] {
        &self.commands
    }

    /// Bank-select sequences seen (a bit-clear of ECON1's bank bits starts one).
    pub fn bank_selects(&self) -> usize {
        let clear_econ1 = regs::opcode::BIT_CLEAR | regs::ECON1.offset();
        self.commands.iter().filter(|&&c| c == clear_econ1).count()
    }

    pub fn clear_log(&mut self) {
        self.transactions = 0;
        self.commands.clear();
    }

    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.transmitted
    }

    pub fn take_transmitted(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.transmitted)
    }

    pub fn pending_packets(&self) -> u8 {
        self.packets
    }

    pub fn memory(&self, addr: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.mem[(addr.wrapping_add(i as u16) & BUFFER_MASK) as usize])
            .collect()
    }

    pub fn register(&self, reg: Register) -> u8 {
        if reg.is_common() {
            self.common(reg.offset())
        } else {
            self.banks[reg.bank() as usize][reg.offset() as usize]
        }
    }

    pub fn phy(&self, addr: u8) -> u16 {
        self.phy[(addr & 0x1f) as usize]
    }

    /// Station address as programmed into MAADR1..6.
    pub fn mac(&self) -> MacAddr {
        let mut octets = [0u8; 6];
        for (o, reg) in octets.iter_mut().zip(regs::MAADR) {
            *o = self.register(reg);
        }
        MacAddr(octets)
    }

    pub fn rx_enabled(&self) -> bool {
        Econ1::from_bits_truncate(self.econ1).contains(Econ1::RXEN)
    }

    fn reg16(&self, low: Register) -> u16 {
        let bank = &self.banks[low.bank() as usize];
        u16::from_le_bytes([bank[low.offset() as usize], bank[low.offset() as usize + 1]])
    }

    fn set_reg16(&mut self, low: Register, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        let bank = &mut self.banks[low.bank() as usize];
        bank[low.offset() as usize] = lo;
        bank[low.offset() as usize + 1] = hi;
    }

    fn ring_bounds(&self) -> (u16, u16) {
        (self.reg16(regs::ERXSTL), self.reg16(regs::ERXNDL))
    }

    fn ring_advance(&self, addr: u16, n: u16) -> u16 {
        let (start, end) = self.ring_bounds();
        if end < start || addr < start || addr > end {
            return addr.wrapping_add(n) & BUFFER_MASK;
        }
        let size = u32::from(end - start) + 1;
        let offset = (u32::from(addr - start) + u32::from(n)) % size;
        start + offset as u16
    }

    /// Stores `frame` in the receive ring as the controller would: 6-byte header, the frame, then
    /// four CRC bytes (left zero). Returns false when reception is off or the ring is full.
    pub fn inject_frame(&mut self, frame: &[u8]) -> bool {
        if !self.rx_enabled() {
            return false;
        }
        let (start, end) = self.ring_bounds();
        let ring = u32::from(end.saturating_sub(start)) + 1;
        let byte_count = frame.len() + 4;
        let stored = (RX_HEADER_LEN + byte_count + 1) & !1;
        let read = self.reg16(regs::ERXRDPTL);
        let used = (u32::from(self.rx_write) + ring - u32::from(read)) % ring;
        if stored as u32 >= ring - used {
            self.eir |= Eir::RXERIF.bits();
            return false;
        }

        let next = self.ring_advance(self.rx_write, stored as u16);
        let len = byte_count as u16;
        let mut record = Vec::with_capacity(RX_HEADER_LEN + byte_count);
        record.extend_from_slice(&next.to_le_bytes());
        record.extend_from_slice(&len.to_le_bytes());
        // Receive status: "received OK" bit.
        record.extend_from_slice(&[0x00, 0x80]);
        record.extend_from_slice(frame);
        record.extend_from_slice(&[0; 4]);

        let mut at = self.rx_write;
        for b in record {
            self.mem[at as usize] = b;
            at = self.ring_advance(at, 1);
        }
        self.rx_write = next;
        self.set_reg16(regs::ERXWRPTL, next);
        self.packets = self.packets.saturating_add(1);
        self.eir |= Eir::PKTIF.bits();
        true
    }

    fn soft_reset(&mut self) {
        self.banks = [[0; BANKED]; 4];
        self.eie = 0;
        self.eir = 0;
        self.econ1 = 0;
        self.econ2 = Econ2::AUTOINC.bits();
        self.packets = 0;
        self.phy_busy = false;
        self.set_reg16(regs::ERXSTL, 0x05fa);
        self.set_reg16(regs::ERXNDL, 0x1fff);
        self.set_reg16(regs::ERDPTL, 0x05fa);
        self.set_reg16(regs::ERXRDPTL, 0x05fa);
        self.rx_write = 0x05fa;
    }

    fn bank(&self) -> usize {
        (self.econ1 & (Econ1::BSEL1 | Econ1::BSEL0).bits()) as usize
    }

    fn common(&self, offset: u8) -> u8 {
        match offset {
            0x1b => self.eie,
            0x1c => self.eir,
            0x1d => {
                if self.faults.clock_never_ready {
                    0
                } else {
                    Estat::CLKRDY.bits()
                }
            }
            0x1e => self.econ2,
            _ => self.econ1,
        }
    }

    fn read_control(&self, offset: u8) -> u8 {
        if offset >= BANKED as u8 {
            return self.common(offset);
        }
        let bank = self.bank();
        if bank == regs::EPKTCNT.bank() as usize && offset == regs::EPKTCNT.offset() {
            return self.packets;
        }
        if bank == regs::MISTAT.bank() as usize && offset == regs::MISTAT.offset() {
            return if self.phy_busy { Mistat::BUSY.bits() } else { 0 };
        }
        self.banks[bank][offset as usize]
    }

    fn write_control(&mut self, offset: u8, value: u8) {
        match offset {
            0x1b => self.eie = value,
            0x1c => self.eir = value,
            0x1d => {}
            0x1e => self.write_econ2(value),
            0x1f => self.write_econ1(value),
            _ => {
                let bank = self.bank();
                self.banks[bank][offset as usize] = value;
                self.banked_side_effects(Register::new(bank as u8, offset));
            }
        }
    }

    fn banked_side_effects(&mut self, reg: Register) {
        if reg == regs::ERXSTL || reg == regs::ERXSTH {
            self.rx_write = self.reg16(regs::ERXSTL);
            self.set_reg16(regs::ERXWRPTL, self.rx_write);
        } else if reg == regs::MIWRH {
            let addr = self.banks[2][regs::MIREGADR.offset() as usize] & 0x1f;
            self.phy[addr as usize] = self.reg16(regs::MIWRL);
            self.phy_busy = self.faults.phy_stuck;
        } else if reg == regs::MICMD {
            let micmd = Micmd::from_bits_truncate(self.banks[2][reg.offset() as usize]);
            if micmd.contains(Micmd::MIIRD) {
                let addr = self.banks[2][regs::MIREGADR.offset() as usize] & 0x1f;
                let [lo, hi] = self.phy[addr as usize].to_le_bytes();
                self.banks[2][regs::MIRDL.offset() as usize] = lo;
                self.banks[2][regs::MIRDH.offset() as usize] = hi;
                self.phy_busy = self.faults.phy_stuck;
            }
        }
    }

    fn write_econ1(&mut self, value: u8) {
        let was = Econ1::from_bits_truncate(self.econ1);
        self.econ1 = value;
        let now = Econ1::from_bits_truncate(value);
        if now.contains(Econ1::TXRTS) && !was.contains(Econ1::TXRTS) {
            self.transmit();
        }
    }

    fn write_econ2(&mut self, value: u8) {
        let mut v = Econ2::from_bits_truncate(value);
        if v.contains(Econ2::PKTDEC) {
            self.packets = self.packets.saturating_sub(1);
            if self.packets == 0 {
                self.eir &= !Eir::PKTIF.bits();
            }
            v.remove(Econ2::PKTDEC);
        }
        self.econ2 = v.bits();
    }

    fn transmit(&mut self) {
        if self.faults.tx_never_completes {
            return;
        }
        let start = self.reg16(regs::ETXSTL);
        let end = self.reg16(regs::ETXNDL);
        // The byte at ETXST is the per-packet control byte.
        let frame = if end > start {
            self.memory(start + 1, (end - start) as usize)
        } else {
            Vec::new()
        };
        self.transmitted.push(frame);
        self.econ1 &= !Econ1::TXRTS.bits();
        self.eir |= Eir::TXIF.bits();
    }

    fn autoinc(&self) -> bool {
        Econ2::from_bits_truncate(self.econ2).contains(Econ2::AUTOINC)
    }

    fn read_memory(&mut self) -> u8 {
        let ptr = self.reg16(regs::ERDPTL);
        let b = self.mem[(ptr & BUFFER_MASK) as usize];
        if self.autoinc() {
            let (_, end) = self.ring_bounds();
            let next = if ptr == end {
                self.ring_bounds().0
            } else {
                ptr.wrapping_add(1) & BUFFER_MASK
            };
            self.set_reg16(regs::ERDPTL, next);
        }
        b
    }

    fn write_memory(&mut self, b: u8) {
        let ptr = self.reg16(regs::EWRPTL);
        self.mem[(ptr & BUFFER_MASK) as usize] = b;
        if self.autoinc() {
            self.set_reg16(regs::EWRPTL, ptr.wrapping_add(1) & BUFFER_MASK);
        }
    }

    fn decode(&mut self, byte: u8) -> State {
        if byte == regs::opcode::SOFT_RESET {
            self.soft_reset();
            return State::Done;
        }
        let arg = byte & 0x1f;
        match byte & 0xe0 {
            0x00 => State::ReadControl(arg),
            0x20 if arg == 0x1a => State::ReadBuffer,
            0x40 => State::WriteControl(arg),
            0x60 if arg == 0x1a => State::WriteBuffer,
            0x80 => State::BitSet(arg),
            0xa0 => State::BitClear(arg),
            _ => State::Done,
        }
    }
}

impl SpiBus for SimChip {
    fn select(&mut self) {
        self.selected = true;
        self.state = State::Idle;
    }

    fn deselect(&mut self) {
        if self.selected {
            self.transactions += 1;
        }
        self.selected = false;
        self.state = State::Idle;
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        if !self.selected {
            return 0xff;
        }
        match self.state {
            State::Idle => {
                self.commands.push(byte);
                self.state = self.decode(byte);
                0
            }
            State::ReadControl(offset) => self.read_control(offset),
            State::ReadBuffer => self.read_memory(),
            State::WriteControl(offset) => {
                self.write_control(offset, byte);
                self.state = State::Done;
                0
            }
            State::WriteBuffer => {
                self.write_memory(byte);
                0
            }
            State::BitSet(offset) => {
                let v = self.read_control(offset) | byte;
                self.write_control(offset, v);
                self.state = State::Done;
                0
            }
            State::BitClear(offset) => {
                let v = self.read_control(offset) & !byte;
                self.write_control(offset, v);
                self.state = State::Done;
                0
            }
            State::Done => 0,
        }
    }
}
