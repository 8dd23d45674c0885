//! Connection lifecycle.
//!
//! A channel present in the table is established; there is no SYN-RECEIVED state. An accepted SYN
//! is answered with SYN+ACK and the channel is live from then on. Inbound segments are classified
//! by flags with SYN (without ACK) taking precedence over RST, RST over FIN, and FIN over data.

use encnet_chip::SpiBus;
use encnet_wire::{EthernetHeader, Ipv4Header, TcpFlags, TcpHeader};
use tracing::{debug, trace, warn};

use crate::app::{AppId, AppRegistry, Conn, Peer};
use crate::channel::{Channel, ChannelId};
use crate::error::Result;
use crate::stack::Core;

pub(crate) fn handle_segment<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
    eth: &EthernetHeader,
    ip: &Ipv4Header,
) -> Result<()> {
    let mut rx = core.nic.chip_mut().rx();
    let Some(raw) = rx.read_exact::<{ TcpHeader::LEN }>() else {
        trace!("truncated TCP header");
        return Ok(());
    };
    let tcp = TcpHeader::from_bytes(&raw);
    let options = tcp.header_len().saturating_sub(TcpHeader::LEN);
    if options > 0 {
        rx.skip(options);
    }

    let Some(app) = apps.find(tcp.dst_port) else {
        trace!(port = tcp.dst_port, "segment for unregistered port");
        return Ok(());
    };

    if tcp.flags.contains(TcpFlags::SYN) {
        if tcp.flags.contains(TcpFlags::ACK) {
            trace!(port = tcp.dst_port, "ignoring SYN+ACK");
            return Ok(());
        }
        accept(core, apps, app, eth, ip, &tcp)
    } else if tcp.flags.contains(TcpFlags::RST) {
        reset(core, apps, app, ip, &tcp);
        Ok(())
    } else if tcp.flags.contains(TcpFlags::FIN) {
        finish(core, apps, app, eth, ip, &tcp)
    } else {
        deliver(core, apps, ip, &tcp)
    }
}

fn accept<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
    app: AppId,
    eth: &EthernetHeader,
    ip: &Ipv4Header,
    tcp: &TcpHeader,
) -> Result<()> {
    // A retransmitted SYN is answered again on the channel it already opened.
    if let Some(id) = core.channels.find(tcp.dst_port, tcp.src_port, ip.src) {
        debug!(channel = id.0, "duplicate SYN");
        let Some(ch) = core.channels.get_mut(id) else {
            return Ok(());
        };
        ch.ack = tcp.seq.wrapping_add(1);
        ch.seq = core.cfg.initial_seq;
        ch.time_remaining = core.cfg.timeout_ticks;
        return core.nic.send_control(ch, TcpFlags::SYN | TcpFlags::ACK);
    }

    let Some(id) = core.channels.free_slot() else {
        debug!(port = tcp.dst_port, peer = %ip.src, "connection table full, SYN ignored");
        return Ok(());
    };
    let peer = Peer {
        ip: ip.src,
        mac: eth.src,
        port: tcp.src_port,
        local_port: tcp.dst_port,
    };
    let Some(callbacks) = apps.get_mut(app) else {
        return Ok(());
    };
    if !callbacks.connect(id, &peer) {
        debug!(port = tcp.dst_port, peer = %ip.src, "application refused connection");
        return Ok(());
    }

    let mut ch = Channel {
        app,
        local_port: tcp.dst_port,
        time_remaining: core.cfg.timeout_ticks,
        seq: core.cfg.initial_seq,
        ack: tcp.seq.wrapping_add(1),
        peer_ip: ip.src,
        peer_mac: eth.src,
        peer_port: tcp.src_port,
    };
    debug!(channel = id.0, peer = %ip.src, peer_port = tcp.src_port, "connection accepted");
    let sent = core.nic.send_control(&mut ch, TcpFlags::SYN | TcpFlags::ACK);
    core.channels.insert(id, ch);
    sent
}

fn reset<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
    app: AppId,
    ip: &Ipv4Header,
    tcp: &TcpHeader,
) {
    let Some(id) = core.channels.find(tcp.dst_port, tcp.src_port, ip.src) else {
        trace!(peer = %ip.src, "RST for unknown channel");
        return;
    };
    if let Some(ch) = core.channels.remove(id) {
        debug!(channel = id.0, "connection reset by peer");
        if let Some(callbacks) = apps.get_mut(app) {
            callbacks.disconnect(id, &ch);
        }
    }
}

fn finish<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
    app: AppId,
    eth: &EthernetHeader,
    ip: &Ipv4Header,
    tcp: &TcpHeader,
) -> Result<()> {
    let payload = core.nic.chip_mut().rx().remaining();
    let tracked = core.channels.find(tcp.dst_port, tcp.src_port, ip.src);
    let mut ch = match tracked.and_then(|id| core.channels.remove(id).map(|ch| (id, ch))) {
        Some((id, ch)) => {
            debug!(channel = id.0, "connection closed by peer");
            if let Some(callbacks) = apps.get_mut(app) {
                callbacks.disconnect(id, &ch);
            }
            ch
        }
        None => {
            trace!(peer = %ip.src, "FIN for unknown channel, answering anyway");
            Channel {
                app,
                local_port: tcp.dst_port,
                time_remaining: 0,
                seq: 0,
                ack: 0,
                peer_ip: ip.src,
                peer_mac: eth.src,
                peer_port: tcp.src_port,
            }
        }
    };
    // The FIN occupies one sequence number after any data it carries.
    ch.ack = tcp.seq.wrapping_add(payload as u32).wrapping_add(1);
    ch.seq = tcp.ack;
    ch.time_remaining = core.cfg.timeout_ticks;
    core.nic.send_control(&mut ch, TcpFlags::FIN | TcpFlags::ACK)
}

fn deliver<B: SpiBus>(
    core: &mut Core<B>,
    apps: &mut AppRegistry<B>,
    ip: &Ipv4Header,
    tcp: &TcpHeader,
) -> Result<()> {
    let Some(id) = core.channels.find(tcp.dst_port, tcp.src_port, ip.src) else {
        trace!(peer = %ip.src, port = tcp.src_port, "segment for unknown channel");
        return Ok(());
    };
    let Some(mut ch) = core.channels.get(id).copied() else {
        return Ok(());
    };
    let payload = core.nic.chip_mut().rx().remaining();
    ch.ack = tcp.seq.wrapping_add(payload as u32);
    ch.seq = tcp.ack;
    ch.time_remaining = core.cfg.timeout_ticks;
    if payload > 0 {
        if let Err(e) = core.nic.send_control(&mut ch, TcpFlags::ACK) {
            core.channels.insert(id, ch);
            return Err(e);
        }
    }

    let Some(callbacks) = apps.get_mut(ch.app) else {
        warn!(channel = id.0, "channel owned by a missing application");
        core.channels.insert(id, ch);
        return Ok(());
    };
    let mut conn = Conn::new(&mut core.nic, &mut core.channels, id, ch);
    let result = callbacks.receive(&mut conn);
    let (ch, closed) = conn.into_parts();
    if closed {
        core.channels.remove(id);
    } else {
        core.channels.insert(id, ch);
    }
    result
}

/// One supervisor pass: every channel loses a tick; idle channels get a keep-alive at the
/// warning threshold and are closed when the count runs out. A failed send does not cut the pass
/// short; the first error is returned once every channel has been visited.
pub(crate) fn tick<B: SpiBus>(core: &mut Core<B>, apps: &mut AppRegistry<B>) -> Result<()> {
    let warning = core.cfg.warning_ticks;
    let mut first_err = None;
    for id in core.channels.ids() {
        let Some(ch) = core.channels.get_mut(id) else {
            continue;
        };
        ch.time_remaining = ch.time_remaining.saturating_sub(1);
        let sent = if ch.time_remaining == 0 {
            expire(core, apps, id)
        } else if ch.time_remaining == warning {
            trace!(channel = id.0, "sending keep-alive");
            core.nic.send_control(ch, TcpFlags::ACK)
        } else {
            Ok(())
        };
        if let Err(e) = sent {
            warn!(channel = id.0, error = %e, "supervisor send failed");
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn expire<B: SpiBus>(core: &mut Core<B>, apps: &mut AppRegistry<B>, id: ChannelId) -> Result<()> {
    let Some(mut ch) = core.channels.remove(id) else {
        return Ok(());
    };
    debug!(channel = id.0, peer = %ch.peer_ip, "connection timed out");
    if let Some(callbacks) = apps.get_mut(ch.app) {
        callbacks.disconnect(id, &ch);
    }
    core.nic.send_control(&mut ch, TcpFlags::FIN | TcpFlags::ACK)
}
