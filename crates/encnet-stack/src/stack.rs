use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use encnet_chip::{Enc28j60, SpiBus};
use encnet_wire::Ipv4Addr;
use tracing::{debug, trace};

use crate::app::{AppId, AppRegistry, TcpApp};
use crate::channel::ChannelTable;
use crate::config::StackConfig;
use crate::error::Result;
use crate::ipconfig::{IpConfig, IpStore};
use crate::nic::Nic;
use crate::{link, tcp};

/// State the protocol handlers work on. Kept apart from the application table so callbacks can
/// be invoked while the handlers hold the channel table and the controller.
pub(crate) struct Core<B> {
    pub(crate) nic: Nic<B>,
    pub(crate) channels: ChannelTable,
    pub(crate) cfg: StackConfig,
}

/// Raises the timeout tick from a timer context. Ticks raised between two polls coalesce into one.
#[derive(Debug, Clone)]
pub struct TickHandle(Arc<AtomicBool>);

impl TickHandle {
    pub fn tick(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// What one call to [`NetStack::poll`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub packet_handled: bool,
    pub tick_handled: bool,
}

/// The network stack: controller, connection table, application table and device address.
///
/// Everything runs from [`NetStack::poll`]; nothing happens in the background.
pub struct NetStack<B, S> {
    core: Core<B>,
    apps: AppRegistry<B>,
    ip: IpConfig<S>,
    tick: Arc<AtomicBool>,
}

impl<B: SpiBus, S: IpStore> NetStack<B, S> {
    /// Validates `cfg`, brings up the controller and loads the device address.
    pub fn new(bus: B, store: S, cfg: StackConfig) -> Result<Self> {
        cfg.validate()?;
        let chip = Enc28j60::init(bus, cfg.chip.clone())?;
        let mut ip = IpConfig::new(store);
        let addr = ip.get();
        debug!(%addr, mac = %cfg.mac(), "network stack up");
        Ok(Self {
            core: Core {
                nic: Nic::new(chip, addr, cfg.ttl, cfg.window_size),
                channels: ChannelTable::new(cfg.max_channels),
                cfg: cfg.clone(),
            },
            apps: AppRegistry::new(cfg.max_apps),
            ip,
            tick: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.core.cfg
    }

    pub fn register_app(&mut self, port: u16, app: Box<dyn TcpApp<B>>) -> Result<AppId> {
        self.apps.register(port, app)
    }

    pub fn ip(&mut self) -> Ipv4Addr {
        self.ip.get()
    }

    /// Stores a new device address. It applies to the next packet handled.
    pub fn set_ip(&mut self, addr: Ipv4Addr) {
        self.ip.set(addr);
        self.core.nic.set_ip(addr);
    }

    pub fn ip_store(&self) -> &S {
        self.ip.store()
    }

    pub fn channels(&self) -> &ChannelTable {
        &self.core.channels
    }

    pub fn chip(&self) -> &Enc28j60<B> {
        self.core.nic.chip()
    }

    pub fn chip_mut(&mut self) -> &mut Enc28j60<B> {
        self.core.nic.chip_mut()
    }

    pub fn tick_handle(&self) -> TickHandle {
        TickHandle(self.tick.clone())
    }

    /// Raises the timeout tick. Handled on the next [`NetStack::poll`].
    pub fn tick(&self) {
        self.tick.store(true, Ordering::Release);
    }

    /// Handles at most one received packet, then the pending tick if there is one.
    pub fn poll(&mut self) -> Result<PollOutcome> {
        let mut outcome = PollOutcome::default();
        self.core.nic.set_ip(self.ip.get());

        if self.core.nic.chip_mut().packet_pending() {
            self.receive_one()?;
            outcome.packet_handled = true;
        }
        if self.tick.swap(false, Ordering::AcqRel) {
            tcp::tick(&mut self.core, &mut self.apps)?;
            outcome.tick_handled = true;
        }
        Ok(outcome)
    }

    fn receive_one(&mut self) -> Result<()> {
        let packet = self.core.nic.chip_mut().begin_packet();
        let handled = link::handle_frame(&mut self.core, &mut self.apps);
        // The ring slot is released even when a handler failed.
        self.core.nic.chip_mut().end_packet(packet);
        trace!(len = packet.len, "packet released");
        handled
    }

    pub fn into_bus(self) -> B {
        self.core.nic.into_chip().into_bus()
    }
}
