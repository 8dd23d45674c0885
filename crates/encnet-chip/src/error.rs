use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChipError>;

/// Failures the controller driver can report.
///
/// With [`crate::SpinLimit::Unbounded`] (the default) the busy-waits never give up, so
/// [`ChipError::Timeout`] only appears on targets that opted into a bounded spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChipError {
    #[error("controller did not report {what} after {polls} polls")]
    Timeout { what: &'static str, polls: u32 },

    #[error("frame of {len} bytes exceeds transmit region of {capacity} bytes")]
    FrameTooLarge { len: u16, capacity: u16 },
}
