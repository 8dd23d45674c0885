//! The device's own IPv4 address, backed by a small persistent store.

use encnet_wire::Ipv4Addr;
use tracing::debug;

/// Persistent home of the device address (EEPROM, flash page, file...).
pub trait IpStore {
    fn load(&mut self) -> Ipv4Addr;
    fn store(&mut self, addr: Ipv4Addr);
}

/// Address used until something else is stored.
pub const DEFAULT_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 180);

#[derive(Debug, Clone)]
pub struct MemoryIpStore {
    addr: Ipv4Addr,
    loads: usize,
}

impl MemoryIpStore {
    pub fn new(addr: Ipv4Addr) -> Self {
        Self { addr, loads: 0 }
    }

    /// How many times the backing value has been read.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

impl Default for MemoryIpStore {
    fn default() -> Self {
        Self::new(DEFAULT_IP)
    }
}

impl IpStore for MemoryIpStore {
    fn load(&mut self) -> Ipv4Addr {
        self.loads += 1;
        self.addr
    }

    fn store(&mut self, addr: Ipv4Addr) {
        self.addr = addr;
    }
}

/// Read-through cache over an [`IpStore`]. The store is read once; only [`IpConfig::set`]
/// replaces the cached value.
#[derive(Debug)]
pub struct IpConfig<S> {
    store: S,
    cached: Option<Ipv4Addr>,
}

impl<S: IpStore> IpConfig<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cached: None,
        }
    }

    pub fn get(&mut self) -> Ipv4Addr {
        match self.cached {
            Some(addr) => addr,
            None => {
                let addr = self.store.load();
                debug!(%addr, "loaded device address");
                self.cached = Some(addr);
                addr
            }
        }
    }

    pub fn set(&mut self, addr: Ipv4Addr) {
        self.store.store(addr);
        self.cached = Some(addr);
    }

    pub fn is_mine(&mut self, addr: Ipv4Addr) -> bool {
        self.get() == addr
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_once_and_writes_through() {
        let mut ip = IpConfig::new(MemoryIpStore::default());
        assert_eq!(ip.get(), DEFAULT_IP);
        assert!(ip.is_mine(DEFAULT_IP));
        assert_eq!(ip.store().loads(), 1);

        let addr = Ipv4Addr::new(10, 0, 0, 7);
        ip.set(addr);
        assert_eq!(ip.get(), addr);
        assert!(!ip.is_mine(DEFAULT_IP));
        assert_eq!(ip.store().loads(), 1);

        let mut reopened = IpConfig::new(ip.store().clone());
        assert_eq!(reopened.get(), addr);
    }
}
