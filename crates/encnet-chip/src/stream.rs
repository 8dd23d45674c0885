//! Sequential access to the packet currently being received and the frame being assembled.
//!
//! Both directions stream through the controller's auto-incrementing buffer pointers, so callers
//! never hold a whole frame in host memory. The receive side tracks how many bytes of the current
//! packet are left; every read is clamped to that count and costs no bus traffic once it reaches
//! zero. The transmit side tracks the frame length so it can hand out marks (offsets from the first
//! frame byte) and later patch values in place.

use tracing::{trace, warn};

use crate::bus::SpiBus;
use crate::driver::Registers;
use crate::error::{ChipError, Result};
use crate::regs::{self, layout, Econ1, Eir};

/// Offset of a byte within the outbound frame; mark 0 is the first destination-MAC byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TxMark(pub u16);

impl TxMark {
    pub const START: Self = Self(0);

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn offset(self, delta: u16) -> Self {
        Self(self.0.wrapping_add(delta))
    }

    fn address(self) -> u16 {
        layout::TX_DATA.wrapping_add(self.0)
    }
}

/// Absolute receive-ring address, as found in a packet's next-packet field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RxPointer(pub u16);

/// Header the controller prepends to every stored packet.
///
/// Returned by [`crate::Enc28j60::begin_packet`] and handed back to
/// [`crate::Enc28j60::end_packet`] to release the packet's ring space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the packet must be released with end_packet"]
pub struct InboundPacket {
    pub next: RxPointer,
    /// Byte count reported by the controller, including the trailing CRC.
    pub len: u16,
    pub status: u16,
}

impl InboundPacket {
    pub const HEADER_LEN: usize = 6;

    pub fn from_header(h: &[u8; Self::HEADER_LEN]) -> Self {
        Self {
            next: RxPointer(u16::from_le_bytes([h[0], h[1]])),
            len: u16::from_le_bytes([h[2], h[3]]),
            status: u16::from_le_bytes([h[4], h[5]]),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RxCursor {
    pub(crate) remaining: u16,
}

#[derive(Debug, Default)]
pub(crate) struct TxCursor {
    /// Bytes written since the control byte; `None` while no frame is open.
    pub(crate) len: Option<u16>,
    pub(crate) last_sent: Option<u16>,
}

/// Reader over the rest of the current inbound packet.
pub struct RxStream<'a, B> {
    pub(crate) regs: &'a mut Registers<B>,
    pub(crate) cursor: &'a mut RxCursor,
}

impl<B: SpiBus> RxStream<'_, B> {
    pub fn remaining(&self) -> u16 {
        self.cursor.remaining
    }

    /// Lowers the remaining count. A larger `n` is ignored; the count never grows.
    pub fn decrease_remaining_to(&mut self, n: u16) {
        if n < self.cursor.remaining {
            self.cursor.remaining = n;
        }
    }

    fn take(&mut self, wanted: usize) -> usize {
        let n = wanted.min(self.cursor.remaining as usize);
        self.cursor.remaining -= n as u16;
        n
    }

    /// Fills as much of `buf` as the packet allows and returns the byte count.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.take(buf.len());
        self.regs.read_buffer(&mut buf[..n]);
        n
    }

    /// Reads a fixed-size record; `None` when the packet ends first (the partial bytes are
    /// consumed regardless).
    pub fn read_exact<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut buf = [0u8; N];
        (self.read(&mut buf) == N).then_some(buf)
    }

    /// Single byte, or 0 once the packet is exhausted.
    pub fn read_byte(&mut self) -> u8 {
        let mut b = [0u8; 1];
        self.read(&mut b);
        b[0]
    }

    /// Discards up to `n` bytes and returns how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = self.take(n);
        self.regs.read_buffer_while(n, |_| true)
    }

    /// Copies bytes into `buf` until `delim` is seen or `buf` fills up. The delimiter is consumed
    /// but not stored. Returns the number of bytes stored.
    pub fn read_until(&mut self, buf: &mut [u8], delim: u8) -> usize {
        self.read_until_any(buf, |b| b == delim)
    }

    /// Like [`Self::read_until`], stopping at a space, CR or LF.
    pub fn read_until_whitespace(&mut self, buf: &mut [u8]) -> usize {
        self.read_until_any(buf, |b| matches!(b, b' ' | b'\r' | b'\n'))
    }

    fn read_until_any(&mut self, buf: &mut [u8], is_delim: impl Fn(u8) -> bool) -> usize {
        let max = buf.len().min(self.cursor.remaining as usize);
        let mut stored = 0;
        let consumed = self.regs.read_buffer_while(max, |b| {
            if is_delim(b) {
                return false;
            }
            buf[stored] = b;
            stored += 1;
            true
        });
        self.cursor.remaining -= consumed as u16;
        stored
    }

    /// Discards bytes through the next `delim`. Returns the number consumed, delimiter included.
    pub fn skip_until(&mut self, delim: u8) -> usize {
        let max = self.cursor.remaining as usize;
        let consumed = self.regs.read_buffer_while(max, |b| b != delim);
        self.cursor.remaining -= consumed as u16;
        consumed
    }

    /// Parses an ASCII decimal with an optional leading `-`.
    ///
    /// Returns the value and the first non-digit byte, which is consumed. The byte is `None` when
    /// the packet ran out first.
    pub fn read_int(&mut self) -> (i32, Option<u8>) {
        let mut value: i32 = 0;
        let mut negative = false;
        let mut first = true;
        let mut stop = None;
        let max = self.cursor.remaining as usize;
        let consumed = self.regs.read_buffer_while(max, |b| {
            let leading = core::mem::replace(&mut first, false);
            match b {
                b'0'..=b'9' => {
                    value = value.wrapping_mul(10).wrapping_add((b - b'0') as i32);
                    true
                }
                b'-' if leading => {
                    negative = true;
                    true
                }
                _ => {
                    stop = Some(b);
                    false
                }
            }
        });
        self.cursor.remaining -= consumed as u16;
        let value = if negative { value.wrapping_neg() } else { value };
        (value, stop)
    }
}

/// Writer for the outbound frame.
pub struct TxStream<'a, B> {
    pub(crate) regs: &'a mut Registers<B>,
    pub(crate) cursor: &'a mut TxCursor,
}

impl<B: SpiBus> TxStream<'_, B> {
    pub fn is_open(&self) -> bool {
        self.cursor.len.is_some()
    }

    /// Opens a fresh frame: both pointers go to the control byte, which is written as zero so the
    /// MAC uses its configured defaults.
    pub fn start_package(&mut self) {
        if self.cursor.len.is_some() {
            trace!("discarding unsent frame");
        }
        self.regs.write_u16(regs::ETXSTL, layout::TX_CONTROL);
        self.regs.write_u16(regs::EWRPTL, layout::TX_CONTROL);
        self.regs.write_buffer(&[0x00]);
        self.cursor.len = Some(0);
    }

    /// Reopens the region without touching its contents, so a previously sent frame can be
    /// patched and sent again.
    pub fn restart_package(&mut self) {
        self.start_package();
    }

    pub fn send_length(&self) -> Option<u16> {
        self.cursor.len
    }

    /// Length of the last frame handed to the MAC.
    pub fn last_sent_len(&self) -> Option<u16> {
        self.cursor.last_sent
    }

    /// The end of the last frame handed to the MAC, as a mark.
    pub fn last_sent_mark(&self) -> Option<TxMark> {
        self.cursor.last_sent.map(TxMark)
    }

    /// Offset the next byte will be written at.
    pub fn mark(&self) -> TxMark {
        match self.cursor.len {
            Some(len) => TxMark(len),
            None => {
                warn!("transmit mark requested with no frame open");
                TxMark::START
            }
        }
    }

    /// Moves the write pointer to `mark`. Subsequent writes overwrite in place; the frame length
    /// follows the pointer.
    pub fn set_pointer(&mut self, mark: TxMark) {
        if self.cursor.len.is_none() {
            warn!(mark = mark.get(), "pointer move with no frame open");
            return;
        }
        self.regs.write_u16(regs::EWRPTL, mark.address());
        self.cursor.len = Some(mark.get());
    }

    pub fn set_pointer_offset(&mut self, mark: TxMark, delta: u16) {
        self.set_pointer(mark.offset(delta));
    }

    pub fn write_all(&mut self, data: &[u8]) {
        let Some(len) = self.cursor.len else {
            warn!(bytes = data.len(), "write with no frame open");
            return;
        };
        self.regs.write_buffer(data);
        self.cursor.len = Some(len.wrapping_add(data.len() as u16));
    }

    pub fn write(&mut self, byte: u8) {
        self.write_all(&[byte]);
    }

    pub fn write_u16_be(&mut self, value: u16) {
        self.write_all(&value.to_be_bytes());
    }

    pub fn write_u32_be(&mut self, value: u32) {
        self.write_all(&value.to_be_bytes());
    }

    /// ASCII decimal without leading zeros; zero is written as `0`.
    pub fn write_unsigned16(&mut self, value: u16) {
        self.write_unsigned32(value as u32);
    }

    pub fn write_unsigned32(&mut self, mut value: u32) {
        let mut digits = [0u8; 10];
        let mut at = digits.len();
        loop {
            at -= 1;
            digits[at] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        self.write_all(&digits[at..]);
    }

    /// Writes `template`, replacing each `%` with the next parameter in decimal. A `%` with no
    /// parameter left is written literally.
    pub fn write_template(&mut self, template: &str, params: &[u32]) {
        let mut params = params.iter();
        for chunk in template.split_inclusive('%') {
            match chunk.strip_suffix('%') {
                Some(text) => {
                    self.write_all(text.as_bytes());
                    match params.next() {
                        Some(&p) => self.write_unsigned32(p),
                        None => {
                            warn!(template, "template placeholder without parameter");
                            self.write(b'%');
                        }
                    }
                }
                None => self.write_all(chunk.as_bytes()),
            }
        }
    }

    /// Hands the frame to the MAC and busy-waits for the transmission to finish.
    ///
    /// The frame is closed whatever the outcome. Sending with no frame open is a logged no-op.
    pub fn send(&mut self) -> Result<()> {
        let Some(len) = self.cursor.len.take() else {
            warn!("send with no frame open");
            return Ok(());
        };
        if len > layout::TX_CAPACITY {
            warn!(len, "outbound frame overflows transmit region");
            return Err(ChipError::FrameTooLarge {
                len,
                capacity: layout::TX_CAPACITY,
            });
        }
        // ETXND addresses the last frame byte; an empty frame ends on the control byte.
        let end = layout::TX_CONTROL.wrapping_add(len);
        self.regs.write_u16(regs::ETXNDL, end);
        self.regs.clear_bits(regs::EIR, Eir::TXIF.bits());
        self.regs.set_bits(regs::ECON1, Econ1::TXRTS.bits());
        self.cursor.last_sent = Some(len);
        trace!(len, "frame queued for transmission");
        self.regs.spin_until("transmit complete", |r| {
            !Econ1::from_bits_truncate(r.read(regs::ECON1)).contains(Econ1::TXRTS)
        })
    }
}
