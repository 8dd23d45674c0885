//! Answers address-resolution requests for the device's own address.

use encnet_chip::SpiBus;
use encnet_wire::{ArpPacket, EthernetHeader, ETHERTYPE_ARP};
use tracing::{debug, trace};

use crate::error::Result;
use crate::nic::Nic;

pub(crate) fn handle_packet<B: SpiBus>(nic: &mut Nic<B>, eth: &EthernetHeader) -> Result<()> {
    if !eth.dst.is_broadcast() && eth.dst != nic.mac() {
        trace!(dst = %eth.dst, "ARP frame for another station");
        return Ok(());
    }
    let Some(raw) = nic.chip_mut().rx().read_exact::<{ ArpPacket::LEN }>() else {
        trace!("truncated ARP payload");
        return Ok(());
    };
    let request = ArpPacket::from_bytes(&raw);
    if !request.is_ipv4_request() {
        trace!(opcode = request.opcode, "ignoring ARP packet");
        return Ok(());
    }
    if request.target_ip != nic.ip() {
        trace!(target = %request.target_ip, "ARP request for another address");
        return Ok(());
    }

    let reply = request.into_reply(nic.mac(), nic.ip());
    let header = EthernetHeader {
        dst: reply.target_mac,
        src: nic.mac(),
        ethertype: ETHERTYPE_ARP,
    };
    let mut tx = nic.chip_mut().tx();
    tx.start_package();
    tx.write_all(&header.to_bytes());
    tx.write_all(&reply.to_bytes());
    tx.send()?;
    debug!(peer = %reply.target_ip, mac = %reply.target_mac, "answered ARP request");
    Ok(())
}
