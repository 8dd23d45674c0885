//! Register access with bank tracking, PHY access and raw buffer-memory streaming.

use tracing::{trace, warn};

use crate::bus::{SpiBus, Transaction};
use crate::config::SpinLimit;
use crate::error::{ChipError, Result};
use crate::regs::{self, opcode, Econ1, Micmd, Mistat, Register};

/// Low-level command layer.
///
/// Banked registers are only reachable after the matching bank is selected in ECON1. The last
/// selected bank is cached and a bank switch is issued only when the target register lives in a
/// different bank, since bank-select traffic dominates the bus otherwise.
pub struct Registers<B> {
    bus: B,
    bank: Option<u8>,
    spin: SpinLimit,
    bank_switches: u64,
}

impl<B: SpiBus> Registers<B> {
    pub fn new(bus: B, spin: SpinLimit) -> Self {
        Self {
            bus,
            bank: None,
            spin,
            bank_switches: 0,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Number of bank-select sequences issued so far.
    pub fn bank_switches(&self) -> u64 {
        self.bank_switches
    }

    /// Soft reset. The controller clears its bank bits, so the cache is dropped as well.
    pub fn reset(&mut self) {
        drop(Transaction::begin(&mut self.bus, opcode::SOFT_RESET));
        self.bank = None;
    }

    fn command(&mut self, op: u8, reg: Register, value: u8) {
        let mut tx = Transaction::begin(&mut self.bus, op | reg.offset());
        tx.send(value);
    }

    fn select_bank(&mut self, reg: Register) {
        if reg.is_common() {
            return;
        }
        let bank = reg.bank();
        if self.bank == Some(bank) {
            return;
        }
        trace!(bank, "selecting register bank");
        let select = Econ1::BSEL1 | Econ1::BSEL0;
        self.command(opcode::BIT_CLEAR, regs::ECON1, select.bits());
        if bank != 0 {
            self.command(opcode::BIT_SET, regs::ECON1, bank);
        }
        self.bank = Some(bank);
        self.bank_switches += 1;
    }

    pub fn read(&mut self, reg: Register) -> u8 {
        self.select_bank(reg);
        let mut tx = Transaction::begin(&mut self.bus, opcode::READ_CONTROL | reg.offset());
        tx.receive()
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.select_bank(reg);
        self.command(opcode::WRITE_CONTROL, reg, value);
    }

    pub fn set_bits(&mut self, reg: Register, mask: u8) {
        self.select_bank(reg);
        self.command(opcode::BIT_SET, reg, mask);
    }

    pub fn clear_bits(&mut self, reg: Register, mask: u8) {
        self.select_bank(reg);
        self.command(opcode::BIT_CLEAR, reg, mask);
    }

    /// Writes a little-endian register pair starting at its low half.
    pub fn write_u16(&mut self, low: Register, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(low, lo);
        self.write(Register::from_raw(low.raw() + 1), hi);
    }

    pub fn read_u16(&mut self, low: Register) -> u16 {
        let lo = self.read(low);
        let hi = self.read(Register::from_raw(low.raw() + 1));
        u16::from_le_bytes([lo, hi])
    }

    /// Polls `done` until it holds, honouring the configured [`SpinLimit`].
    pub fn spin_until(
        &mut self,
        what: &'static str,
        mut done: impl FnMut(&mut Self) -> bool,
    ) -> Result<()> {
        let mut polls: u32 = 0;
        loop {
            if done(self) {
                return Ok(());
            }
            polls = polls.saturating_add(1);
            if let SpinLimit::Bounded(max) = self.spin {
                if polls >= max {
                    warn!(what, polls, "controller busy-wait gave up");
                    return Err(ChipError::Timeout { what, polls });
                }
            }
            core::hint::spin_loop();
        }
    }

    fn wait_phy_idle(&mut self) -> Result<()> {
        self.spin_until("PHY idle", |r| {
            !Mistat::from_bits_truncate(r.read(regs::MISTAT)).contains(Mistat::BUSY)
        })
    }

    /// Writes a PHY sub-register and waits for the MII interface to finish.
    pub fn write_phy(&mut self, addr: u8, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.write(regs::MIREGADR, addr);
        self.write(regs::MIWRL, lo);
        // Writing the high byte starts the MII transaction.
        self.write(regs::MIWRH, hi);
        self.wait_phy_idle()
    }

    pub fn read_phy(&mut self, addr: u8) -> Result<u16> {
        self.write(regs::MIREGADR, addr);
        self.write(regs::MICMD, Micmd::MIIRD.bits());
        self.wait_phy_idle()?;
        self.write(regs::MICMD, 0);
        let lo = self.read(regs::MIRDL);
        let hi = self.read(regs::MIRDH);
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Streams `buf.len()` bytes out of buffer memory at ERDPT.
    pub fn read_buffer(&mut self, buf: &mut [u8]) {
        if buf.is_empty() {
            return;
        }
        let mut tx = Transaction::begin(&mut self.bus, opcode::READ_BUFFER);
        for b in buf.iter_mut() {
            *b = tx.receive();
        }
    }

    /// Streams bytes out of buffer memory while `keep_going` returns true, reading at most `max`.
    /// Returns how many bytes were clocked in, including the one that stopped the run.
    pub fn read_buffer_while(
        &mut self,
        max: usize,
        mut keep_going: impl FnMut(u8) -> bool,
    ) -> usize {
        if max == 0 {
            return 0;
        }
        let mut tx = Transaction::begin(&mut self.bus, opcode::READ_BUFFER);
        let mut n = 0;
        while n < max {
            let byte = tx.receive();
            n += 1;
            if !keep_going(byte) {
                break;
            }
        }
        n
    }

    /// Streams `data` into buffer memory at EWRPT.
    pub fn write_buffer(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut tx = Transaction::begin(&mut self.bus, opcode::WRITE_BUFFER);
        for &b in data {
            tx.send(b);
        }
    }
}
