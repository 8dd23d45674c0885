use encnet_wire::{Ipv4Addr, MacAddr};

use crate::app::AppId;

/// Slot index in the connection table; the only identity a channel has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub usize);

/// State of one established connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub app: AppId,
    pub local_port: u16,
    /// Ticks left before the channel is closed for inactivity.
    pub time_remaining: u16,
    /// Next sequence number to send.
    pub seq: u32,
    /// Next sequence number expected from the peer; sent as the ack field.
    pub ack: u32,
    pub peer_ip: Ipv4Addr,
    /// Used for addressing replies only; not part of the lookup key.
    pub peer_mac: MacAddr,
    pub peer_port: u16,
}

impl Channel {
    pub fn matches(&self, local_port: u16, peer_port: u16, peer_ip: Ipv4Addr) -> bool {
        self.local_port == local_port && self.peer_port == peer_port && self.peer_ip == peer_ip
    }
}

/// Fixed-capacity connection table.
#[derive(Debug)]
pub struct ChannelTable {
    slots: Vec<Option<Channel>>,
}

impl ChannelTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_slot(&self) -> Option<ChannelId> {
        self.slots.iter().position(Option::is_none).map(ChannelId)
    }

    /// Stores `channel` at `id`, returning what was there.
    pub fn insert(&mut self, id: ChannelId, channel: Channel) -> Option<Channel> {
        self.slots.get_mut(id.0)?.replace(channel)
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    pub fn remove(&mut self, id: ChannelId) -> Option<Channel> {
        self.slots.get_mut(id.0)?.take()
    }

    /// First channel on `(local_port, peer_port, peer_ip)`. The peer MAC is not part of the key:
    /// two hosts sharing an address and port collide.
    pub fn find(&self, local_port: u16, peer_port: u16, peer_ip: Ipv4Addr) -> Option<ChannelId> {
        self.iter()
            .find(|(_, ch)| ch.matches(local_port, peer_port, peer_ip))
            .map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Channel)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|ch| (ChannelId(i), ch)))
    }

    pub fn ids(&self) -> Vec<ChannelId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(peer_port: u16) -> Channel {
        Channel {
            app: AppId(0),
            local_port: 80,
            time_remaining: 100,
            seq: 0x100,
            ack: 1,
            peer_ip: Ipv4Addr::new(10, 0, 0, 2),
            peer_mac: MacAddr([2, 0, 0, 0, 0, 2]),
            peer_port,
        }
    }

    #[test]
    fn slots_are_reused_lowest_first() {
        let mut table = ChannelTable::new(2);
        assert_eq!(table.free_slot(), Some(ChannelId(0)));
        table.insert(ChannelId(0), channel(1000));
        table.insert(ChannelId(1), channel(1001));
        assert_eq!(table.free_slot(), None);
        assert_eq!(table.len(), 2);

        table.remove(ChannelId(0));
        assert_eq!(table.free_slot(), Some(ChannelId(0)));
        assert_eq!(table.find(80, 1001, Ipv4Addr::new(10, 0, 0, 2)), Some(ChannelId(1)));
        assert_eq!(table.find(80, 1000, Ipv4Addr::new(10, 0, 0, 2)), None);
    }

    #[test]
    fn lookup_ignores_peer_mac() {
        let mut table = ChannelTable::new(1);
        table.insert(ChannelId(0), channel(5000));
        let found = table.find(80, 5000, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(found, Some(ChannelId(0)));
        assert_eq!(table.find(81, 5000, Ipv4Addr::new(10, 0, 0, 2)), None);
        assert!(table.insert(ChannelId(7), channel(1)).is_none());
        assert!(table.get(ChannelId(7)).is_none());
    }
}
