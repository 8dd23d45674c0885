//! Application contract: listening registrations and the per-segment connection view.

use encnet_chip::{RxStream, SpiBus, TxStream};
use encnet_wire::{Ipv4Addr, MacAddr, TcpFlags};
use tracing::{debug, warn};

use crate::channel::{Channel, ChannelId, ChannelTable};
use crate::error::{Result, StackError};
use crate::nic::Nic;

/// Index of a registration in the application table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(pub usize);

/// Who is asking to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub port: u16,
    /// The registered port the SYN was addressed to.
    pub local_port: u16,
}

/// Callbacks of a listening application.
pub trait TcpApp<B> {
    /// A SYN arrived and slot `id` is free. Returning false refuses the connection silently.
    fn connect(&mut self, id: ChannelId, peer: &Peer) -> bool;

    /// A segment arrived on an established channel. The payload is read from `conn.rx()`.
    fn receive(&mut self, conn: &mut Conn<'_, B>) -> Result<()>;

    /// The channel is going away because of a peer FIN or RST or because it timed out.
    fn disconnect(&mut self, id: ChannelId, channel: &Channel);
}

struct Registration<B> {
    port: u16,
    app: Box<dyn TcpApp<B>>,
}

/// Fixed-capacity table of listening applications, at most one per port.
pub struct AppRegistry<B> {
    slots: Vec<Option<Registration<B>>>,
}

impl<B: SpiBus> AppRegistry<B> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn register(&mut self, port: u16, app: Box<dyn TcpApp<B>>) -> Result<AppId> {
        if self.find(port).is_some() {
            return Err(StackError::PortInUse { port });
        }
        let Some(free) = self.slots.iter().position(Option::is_none) else {
            return Err(StackError::AppTableFull {
                capacity: self.capacity(),
            });
        };
        self.slots[free] = Some(Registration { port, app });
        debug!(port, app = free, "application registered");
        Ok(AppId(free))
    }

    pub fn find(&self, port: u16) -> Option<AppId> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|r| r.port == port))
            .map(AppId)
    }

    pub fn port(&self, id: AppId) -> Option<u16> {
        Some(self.slots.get(id.0)?.as_ref()?.port)
    }

    pub(crate) fn get_mut(&mut self, id: AppId) -> Option<&mut (dyn TcpApp<B> + 'static)> {
        Some(self.slots.get_mut(id.0)?.as_mut()?.app.as_mut())
    }
}

/// View of one channel handed to [`TcpApp::receive`].
///
/// Reads come from the inbound segment's payload; responses are written with
/// [`Conn::begin_response`], the transmit stream and [`Conn::finish_response`].
pub struct Conn<'a, B> {
    nic: &'a mut Nic<B>,
    channels: &'a mut ChannelTable,
    id: ChannelId,
    channel: Channel,
    closed: bool,
}

impl<'a, B: SpiBus> Conn<'a, B> {
    pub(crate) fn new(
        nic: &'a mut Nic<B>,
        channels: &'a mut ChannelTable,
        id: ChannelId,
        channel: Channel,
    ) -> Self {
        Self {
            nic,
            channels,
            id,
            channel,
            closed: false,
        }
    }

    pub(crate) fn into_parts(self) -> (Channel, bool) {
        (self.channel, self.closed)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Other open channels, e.g. to fan a message out with [`Conn::resend_to`].
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &Channel)> + '_ {
        let me = self.id;
        self.channels.iter().filter(move |(id, _)| *id != me)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn local_ip(&self) -> Ipv4Addr {
        self.nic.ip()
    }

    pub fn rx(&mut self) -> RxStream<'_, B> {
        self.nic.chip_mut().rx()
    }

    pub fn tx(&mut self) -> TxStream<'_, B> {
        self.nic.chip_mut().tx()
    }

    /// Copies payload bytes into the open response until `delim`. See
    /// [`encnet_chip::Enc28j60::copy_incoming_to_outgoing`].
    pub fn copy_incoming_to_outgoing(&mut self, delim: u8) -> usize {
        self.nic.chip_mut().copy_incoming_to_outgoing(delim)
    }

    pub fn send_ack(&mut self) -> Result<()> {
        if self.refuse_closed() {
            return Ok(());
        }
        self.nic.send_control(&mut self.channel, TcpFlags::ACK)
    }

    /// Opens a response segment; payload goes through [`Conn::tx`].
    pub fn begin_response(&mut self, flags: TcpFlags) {
        if self.refuse_closed() {
            return;
        }
        self.nic.begin_segment(&self.channel, flags);
    }

    pub fn finish_response(&mut self) -> Result<()> {
        self.nic.finish_segment(&mut self.channel)
    }

    /// One-shot response carrying `payload`.
    pub fn respond(&mut self, flags: TcpFlags, payload: &[u8]) -> Result<()> {
        if self.refuse_closed() {
            return Ok(());
        }
        self.begin_response(flags);
        self.tx().write_all(payload);
        self.finish_response()
    }

    /// Sends the payload of the segment just sent once more, addressed to channel `other`.
    pub fn resend_to(&mut self, other: ChannelId, flags: TcpFlags) -> Result<()> {
        if other == self.id {
            return self.nic.resend_segment(&mut self.channel, flags);
        }
        match self.channels.get_mut(other) {
            Some(ch) => self.nic.resend_segment(ch, flags),
            None => {
                warn!(channel = other.0, "resend to a free slot");
                Ok(())
            }
        }
    }

    /// Closes the channel from this side with FIN+ACK. The slot is released once the callback
    /// returns; the application's disconnect callback is not invoked.
    pub fn close(&mut self) -> Result<()> {
        if self.refuse_closed() {
            return Ok(());
        }
        self.nic
            .send_control(&mut self.channel, TcpFlags::FIN | TcpFlags::ACK)?;
        self.closed = true;
        debug!(channel = self.id.0, "channel closed by application");
        Ok(())
    }

    fn refuse_closed(&self) -> bool {
        if self.closed {
            warn!(channel = self.id.0, "use of a channel after close");
        }
        self.closed
    }
}
