//! Control register map, SPI opcodes and buffer memory layout.

/// Control register address: bank in bits 7..6, offset within the bank in bits 4..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(u8);

impl Register {
    const OFFSET_MASK: u8 = 0x1f;
    /// Offsets from here up are mapped into every bank.
    const FIRST_COMMON: u8 = 0x1b;

    pub const fn new(bank: u8, offset: u8) -> Self {
        Self(((bank & 0x03) << 6) | (offset & Self::OFFSET_MASK))
    }

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn bank(self) -> u8 {
        self.0 >> 6
    }

    pub const fn offset(self) -> u8 {
        self.0 & Self::OFFSET_MASK
    }

    /// EIE, EIR, ESTAT, ECON2 and ECON1 are reachable regardless of the selected bank.
    pub const fn is_common(self) -> bool {
        self.offset() >= Self::FIRST_COMMON
    }
}

/// SPI command opcodes. The low five bits carry the register offset where one applies.
pub mod opcode {
    pub const READ_CONTROL: u8 = 0x00;
    pub const READ_BUFFER: u8 = 0x3a;
    pub const WRITE_CONTROL: u8 = 0x40;
    pub const WRITE_BUFFER: u8 = 0x7a;
    pub const BIT_SET: u8 = 0x80;
    pub const BIT_CLEAR: u8 = 0xa0;
    pub const SOFT_RESET: u8 = 0xff;
}

// Bank 0
pub const ERDPTL: Register = Register::new(0, 0x00);
pub const ERDPTH: Register = Register::new(0, 0x01);
pub const EWRPTL: Register = Register::new(0, 0x02);
pub const EWRPTH: Register = Register::new(0, 0x03);
pub const ETXSTL: Register = Register::new(0, 0x04);
pub const ETXSTH: Register = Register::new(0, 0x05);
pub const ETXNDL: Register = Register::new(0, 0x06);
pub const ETXNDH: Register = Register::new(0, 0x07);
pub const ERXSTL: Register = Register::new(0, 0x08);
pub const ERXSTH: Register = Register::new(0, 0x09);
pub const ERXNDL: Register = Register::new(0, 0x0a);
pub const ERXNDH: Register = Register::new(0, 0x0b);
pub const ERXRDPTL: Register = Register::new(0, 0x0c);
pub const ERXRDPTH: Register = Register::new(0, 0x0d);
pub const ERXWRPTL: Register = Register::new(0, 0x0e);
pub const ERXWRPTH: Register = Register::new(0, 0x0f);

// Bank 1
pub const ERXFCON: Register = Register::new(1, 0x18);
pub const EPKTCNT: Register = Register::new(1, 0x19);

// Bank 2
pub const MACON1: Register = Register::new(2, 0x00);
pub const MACON3: Register = Register::new(2, 0x02);
pub const MACON4: Register = Register::new(2, 0x03);
pub const MABBIPG: Register = Register::new(2, 0x04);
pub const MAIPGL: Register = Register::new(2, 0x06);
pub const MAIPGH: Register = Register::new(2, 0x07);
pub const MAMXFLL: Register = Register::new(2, 0x0a);
pub const MAMXFLH: Register = Register::new(2, 0x0b);
pub const MICMD: Register = Register::new(2, 0x12);
pub const MIREGADR: Register = Register::new(2, 0x14);
pub const MIWRL: Register = Register::new(2, 0x16);
pub const MIWRH: Register = Register::new(2, 0x17);
pub const MIRDL: Register = Register::new(2, 0x18);
pub const MIRDH: Register = Register::new(2, 0x19);

// Bank 3
pub const MAADR5: Register = Register::new(3, 0x00);
pub const MAADR6: Register = Register::new(3, 0x01);
pub const MAADR3: Register = Register::new(3, 0x02);
pub const MAADR4: Register = Register::new(3, 0x03);
pub const MAADR1: Register = Register::new(3, 0x04);
pub const MAADR2: Register = Register::new(3, 0x05);
pub const MISTAT: Register = Register::new(3, 0x0a);
pub const EREVID: Register = Register::new(3, 0x12);

// Common to all banks
pub const EIE: Register = Register::new(0, 0x1b);
pub const EIR: Register = Register::new(0, 0x1c);
pub const ESTAT: Register = Register::new(0, 0x1d);
pub const ECON2: Register = Register::new(0, 0x1e);
pub const ECON1: Register = Register::new(0, 0x1f);

/// Station address registers in wire order (first octet first).
pub const MAADR: [Register; 6] = [MAADR1, MAADR2, MAADR3, MAADR4, MAADR5, MAADR6];

/// PHY sub-registers, reached through MIREGADR/MIWR/MIRD.
pub mod phy {
    pub const PHCON1: u8 = 0x00;
    pub const PHSTAT1: u8 = 0x01;
    pub const PHCON2: u8 = 0x10;
    pub const PHSTAT2: u8 = 0x11;

    pub const PHCON1_PDPXMD: u16 = 1 << 8;
    pub const PHSTAT2_LSTAT: u16 = 1 << 10;
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Econ1: u8 {
        const TXRST = 1 << 7;
        const RXRST = 1 << 6;
        const DMAST = 1 << 5;
        const CSUMEN = 1 << 4;
        const TXRTS = 1 << 3;
        const RXEN = 1 << 2;
        const BSEL1 = 1 << 1;
        const BSEL0 = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Econ2: u8 {
        const AUTOINC = 1 << 7;
        const PKTDEC = 1 << 6;
        const PWRSV = 1 << 5;
        const VRPS = 1 << 3;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eir: u8 {
        const PKTIF = 1 << 6;
        const DMAIF = 1 << 5;
        const LINKIF = 1 << 4;
        const TXIF = 1 << 3;
        const TXERIF = 1 << 1;
        const RXERIF = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Estat: u8 {
        const INT = 1 << 7;
        const BUFER = 1 << 6;
        const LATECOL = 1 << 4;
        const RXBUSY = 1 << 2;
        const TXABRT = 1 << 1;
        const CLKRDY = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Macon1: u8 {
        const TXPAUS = 1 << 3;
        const RXPAUS = 1 << 2;
        const PASSALL = 1 << 1;
        const MARXEN = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Macon3: u8 {
        const PADCFG2 = 1 << 7;
        const PADCFG1 = 1 << 6;
        const PADCFG0 = 1 << 5;
        const TXCRCEN = 1 << 4;
        const PHDREN = 1 << 3;
        const HFRMEN = 1 << 2;
        const FRMLNEN = 1 << 1;
        const FULDPX = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Micmd: u8 {
        const MIISCAN = 1 << 1;
        const MIIRD = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mistat: u8 {
        const NVALID = 1 << 2;
        const SCAN = 1 << 1;
        const BUSY = 1 << 0;
    }
}

/// Buffer memory layout: receive ring, then one control byte and the transmit frame.
pub mod layout {
    /// First byte of the receive ring.
    pub const RX_START: u16 = 0x0000;
    /// Last byte of the receive ring (inclusive, as programmed into ERXND).
    pub const RX_END: u16 = 0x0800;
    /// Per-packet control byte; frame data follows immediately.
    pub const TX_CONTROL: u16 = 0x0801;
    /// Address of transmit mark 0.
    pub const TX_DATA: u16 = TX_CONTROL + 1;
    pub const TX_END: u16 = 0x0b00;
    /// Largest frame the transmit region can hold.
    pub const TX_CAPACITY: u16 = TX_END - TX_DATA + 1;
    pub const BUFFER_SIZE: usize = 0x2000;
    pub const MAX_FRAME_LEN: u16 = 1518;
}
