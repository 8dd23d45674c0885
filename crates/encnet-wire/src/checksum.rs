//! Internet checksum (RFC 1071): ones-complement sum of 16-bit big-endian words.
//!
//! The accumulator is kept as a `u32` so partial sums can be carried across calls (the TCP
//! pseudo-header sum is computed while the header is written and finished after the payload).

use core::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u32);

impl Checksum {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Continues from a previously folded partial sum.
    pub const fn from_partial(partial: u16) -> Self {
        Self(partial as u32)
    }

    pub fn add_u16(&mut self, word: u16) {
        self.0 = self.0.wrapping_add(word as u32);
        // Keep headroom so long streams never overflow the accumulator.
        if self.0 & 0x8000_0000 != 0 {
            self.0 = (self.0 & 0xffff) + (self.0 >> 16);
        }
    }

    pub fn add_u32(&mut self, value: u32) {
        self.add_u16((value >> 16) as u16);
        self.add_u16(value as u16);
    }

    /// Adds a big-endian byte run. A trailing odd byte is padded as the high byte of a word.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            self.add_u16(u16::from_be_bytes([pair[0], pair[1]]));
        }
        if let [last] = chunks.remainder() {
            self.add_u16((*last as u16) << 8);
        }
    }

    pub fn add_ip(&mut self, ip: Ipv4Addr) {
        self.add_u32(u32::from(ip));
    }

    /// End-around carry until the sum fits in 16 bits.
    pub fn fold(self) -> u16 {
        let mut sum = self.0;
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        sum as u16
    }

    /// The value written into a checksum field.
    pub fn finish(self) -> u16 {
        !self.fold()
    }
}

/// Partial sum over the TCP/UDP pseudo-header, without the length term.
pub fn pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8) -> Checksum {
    let mut sum = Checksum::new();
    sum.add_ip(src);
    sum.add_ip(dst);
    sum.add_u16(protocol as u16);
    sum
}

/// True when `bytes` already carries its own checksum, i.e. the sum complements to zero.
pub fn is_valid(initial: Checksum, bytes: &[u8]) -> bool {
    let mut sum = initial;
    sum.add_bytes(bytes);
    sum.finish() == 0
}
