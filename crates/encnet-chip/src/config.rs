use encnet_wire::MacAddr;

use crate::regs::layout;

/// How long busy-waits on controller status bits may spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpinLimit {
    /// Spin until the controller answers. A dead chip hangs the caller.
    #[default]
    Unbounded,
    /// Give up with [`crate::ChipError::Timeout`] after this many status polls.
    Bounded(u32),
}

#[derive(Debug, Clone)]
pub struct ChipConfig {
    /// Station address programmed into MAADR1..6 and used as the source of every outbound frame.
    pub mac: MacAddr,
    pub spin: SpinLimit,
    /// Largest frame the MAC will accept or pad to (MAMXFL).
    pub max_frame_len: u16,
    pub full_duplex: bool,
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self {
            mac: MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            spin: SpinLimit::Unbounded,
            max_frame_len: layout::MAX_FRAME_LEN,
            full_duplex: true,
        }
    }
}
