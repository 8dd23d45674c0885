use encnet_chip::ChipConfig;
use encnet_wire::MacAddr;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Controller settings; `chip.mac` is the station address used on every outbound frame.
    pub chip: ChipConfig,

    /// Capacity of the connection table. A SYN arriving while it is full is ignored.
    pub max_channels: usize,

    /// Capacity of the application table. Registrations are permanent.
    pub max_apps: usize,

    /// Ticks a channel may stay idle before it is closed. Any inbound segment refreshes it.
    pub timeout_ticks: u16,

    /// Remaining-tick count at which an idle channel gets a keep-alive.
    pub warning_ticks: u16,

    /// Receive window advertised in every segment.
    pub window_size: u16,

    /// Sequence number a new channel starts sending from.
    pub initial_seq: u32,

    pub ttl: u8,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            chip: ChipConfig::default(),
            max_channels: 10,
            max_apps: 5,
            timeout_ticks: 100,
            warning_ticks: 20,
            window_size: 5792,
            initial_seq: 0x100,
            ttl: 64,
        }
    }
}

impl StackConfig {
    pub fn mac(&self) -> MacAddr {
        self.chip.mac
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_channels == 0 {
            return Err(ConfigError::Zero {
                field: "max_channels",
            });
        }
        if self.max_apps == 0 {
            return Err(ConfigError::Zero { field: "max_apps" });
        }
        if self.timeout_ticks == 0 {
            return Err(ConfigError::Zero {
                field: "timeout_ticks",
            });
        }
        if self.warning_ticks >= self.timeout_ticks {
            return Err(ConfigError::WarningNotBelowTimeout {
                warning: self.warning_ticks,
                timeout: self.timeout_ticks,
            });
        }
        if self.chip.mac.octets()[0] & 0x01 != 0 {
            return Err(ConfigError::MulticastMac(self.chip.mac));
        }
        Ok(())
    }
}
