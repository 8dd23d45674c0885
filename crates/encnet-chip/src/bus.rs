//! Boundary to the synchronous serial link.
//!
//! The controller is driven by single-byte exchanges inside a chip-select window. The link itself
//! (pins, clocking) is outside this crate; implementors only need to move one byte each way.

/// One-byte-each-way exchange primitive plus chip-select framing.
pub trait SpiBus {
    /// Asserts chip select, opening a command frame.
    fn select(&mut self);

    /// Releases chip select, closing the current command frame.
    fn deselect(&mut self);

    /// Clocks `byte` out and returns the byte clocked in at the same time.
    fn transfer(&mut self, byte: u8) -> u8;
}

impl<T: SpiBus + ?Sized> SpiBus for &mut T {
    fn select(&mut self) {
        (**self).select();
    }

    fn deselect(&mut self) {
        (**self).deselect();
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        (**self).transfer(byte)
    }
}

impl<T: SpiBus + ?Sized> SpiBus for Box<T> {
    fn select(&mut self) {
        (**self).select();
    }

    fn deselect(&mut self) {
        (**self).deselect();
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        (**self).transfer(byte)
    }
}

/// A single command frame. Chip select is released when the guard is dropped.
pub struct Transaction<'a, B: SpiBus + ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: SpiBus + ?Sized> Transaction<'a, B> {
    pub fn begin(bus: &'a mut B, opcode: u8) -> Self {
        bus.select();
        bus.transfer(opcode);
        Self { bus }
    }

    pub fn send(&mut self, byte: u8) {
        self.bus.transfer(byte);
    }

    /// Clocks out a dummy byte to read one back.
    pub fn receive(&mut self) -> u8 {
        self.bus.transfer(0)
    }
}

impl<B: SpiBus + ?Sized> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        self.bus.deselect();
    }
}
