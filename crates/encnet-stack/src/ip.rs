//! IPv4 receive validation.

use encnet_chip::SpiBus;
use encnet_wire::{EthernetHeader, Ipv4Header, IPPROTO_TCP};
use tracing::trace;

use crate::app::AppRegistry;
use crate::error::Result;
use crate::stack::Core;
use crate::tcp;

pub(crate) fn handle_packet<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
    eth: &EthernetHeader,
) -> Result<()> {
    let mut rx = core.nic.chip_mut().rx();
    let Some(raw) = rx.read_exact::<{ Ipv4Header::LEN }>() else {
        trace!("truncated IPv4 header");
        return Ok(());
    };
    let ip = Ipv4Header::from_bytes(&raw);

    // Ethernet padding and the trailing CRC are not part of the datagram.
    rx.decrease_remaining_to(ip.total_len.saturating_sub(Ipv4Header::LEN as u16));
    let options = ip.header_len().saturating_sub(Ipv4Header::LEN);
    if options > 0 {
        rx.skip(options);
    }

    if ip.dst != core.nic.ip() {
        trace!(dst = %ip.dst, "datagram for another address");
        return Ok(());
    }
    if ip.protocol != IPPROTO_TCP {
        trace!(protocol = ip.protocol, "unsupported protocol");
        return Ok(());
    }
    tcp::handle_segment(core, apps, eth, &ip)
}
