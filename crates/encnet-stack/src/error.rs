use encnet_chip::ChipError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Chip(#[from] ChipError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("application table is full ({capacity} registrations)")]
    AppTableFull { capacity: usize },

    #[error("port {port} already has a registered application")]
    PortInUse { port: u16 },

    /// Raised by applications from their receive callback; propagated out of `poll`.
    #[error("application error: {0}")]
    App(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be non-zero")]
    Zero { field: &'static str },

    #[error("warning threshold {warning} must be below timeout {timeout}")]
    WarningNotBelowTimeout { warning: u16, timeout: u16 },

    #[error("station address {0} is a group address")]
    MulticastMac(encnet_wire::MacAddr),
}
