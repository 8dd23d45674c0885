//! Frame dispatch by EtherType.

use encnet_chip::SpiBus;
use encnet_wire::{EthernetHeader, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use tracing::trace;

use crate::app::AppRegistry;
use crate::error::Result;
use crate::stack::Core;
use crate::{arp, ip};

pub(crate) fn handle_frame<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
) -> Result<()> {
    let Some(raw) = core.nic.chip_mut().rx().read_exact::<{ EthernetHeader::LEN }>() else {
        trace!("runt frame dropped");
        return Ok(());
    };
    let eth = EthernetHeader::from_bytes(&raw);
    match eth.ethertype {
        ETHERTYPE_IPV4 => ip::handle_packet(core, apps, &eth),
        ETHERTYPE_ARP => arp::handle_packet(&mut core.nic, &eth),
        other => {
            trace!(ethertype = other, src = %eth.src, "unhandled ethertype");
            Ok(())
        }
    }
}
