mod common;

use common::*;
use encnet_chip::sim::SimChip;
use encnet_stack::{IpStore, MemoryIpStore, NetStack};
use encnet_wire::frame;
use encnet_wire::{
    ArpPacket, EthernetHeader, Ipv4Addr, MacAddr, TcpFlags, ARP_OP_REPLY, ETHERTYPE_ARP,
    HTYPE_ETHERNET,
};

fn parse_arp(frame: &[u8]) -> (EthernetHeader, ArpPacket) {
    frame::parse_arp_frame(frame).expect("not an ARP frame")
}

#[test]
fn broadcast_request_for_our_address_is_answered() {
    let mut stack = stack();
    let frames = deliver(
        &mut stack,
        &arp_request(MacAddr::BROADCAST, PEER_IP, STACK_IP),
    );
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].len(), EthernetHeader::LEN + ArpPacket::LEN);

    let (eth, reply) = parse_arp(&frames[0]);
    assert_eq!(eth.dst, PEER_MAC);
    assert_eq!(eth.src, STACK_MAC);
    assert_eq!(eth.ethertype, ETHERTYPE_ARP);
    assert_eq!(reply.htype, HTYPE_ETHERNET);
    assert_eq!(reply.opcode, ARP_OP_REPLY);
    assert_eq!(reply.sender_mac, STACK_MAC);
    assert_eq!(reply.sender_ip, STACK_IP);
    assert_eq!(reply.target_mac, PEER_MAC);
    assert_eq!(reply.target_ip, PEER_IP);
}

#[test]
fn request_for_another_address_is_ignored() {
    let mut stack = stack();
    let frames = deliver(
        &mut stack,
        &arp_request(MacAddr::BROADCAST, PEER_IP, Ipv4Addr::new(192, 168, 1, 7)),
    );
    assert!(frames.is_empty());
}

#[test]
fn unicast_request_must_be_for_our_mac() {
    let mut stack = stack();
    let other = MacAddr([0x02, 0, 0, 0, 0, 0x99]);
    assert!(deliver(&mut stack, &arp_request(other, PEER_IP, STACK_IP)).is_empty());
    assert_eq!(
        deliver(&mut stack, &arp_request(STACK_MAC, PEER_IP, STACK_IP)).len(),
        1
    );
}

#[test]
fn replies_are_not_answered() {
    let mut stack = stack();
    let mut frame = arp_request(MacAddr::BROADCAST, PEER_IP, STACK_IP);
    // Opcode field of the ARP payload.
    frame[EthernetHeader::LEN + 6..EthernetHeader::LEN + 8]
        .copy_from_slice(&ARP_OP_REPLY.to_be_bytes());
    assert!(deliver(&mut stack, &frame).is_empty());
}

#[test]
fn changing_the_address_is_persisted_and_used() {
    let mut stack = stack();
    let new_ip = Ipv4Addr::new(10, 0, 0, 5);
    stack.set_ip(new_ip);
    assert_eq!(stack.ip(), new_ip);
    assert_eq!(stack.ip_store().clone().load(), new_ip);

    assert!(deliver(
        &mut stack,
        &arp_request(MacAddr::BROADCAST, PEER_IP, STACK_IP)
    )
    .is_empty());
    let frames = deliver(&mut stack, &arp_request(MacAddr::BROADCAST, PEER_IP, new_ip));
    assert_eq!(parse_arp(&frames[0]).1.sender_ip, new_ip);
}

#[test]
fn stored_address_is_loaded_at_startup() {
    init_tracing();
    let stored = Ipv4Addr::new(172, 16, 0, 9);
    let mut stack: NetStack<SimChip, MemoryIpStore> =
        NetStack::new(SimChip::new(), MemoryIpStore::new(stored), config()).unwrap();
    assert_eq!(stack.ip(), stored);
    assert_eq!(stack.ip_store().loads(), 1);
    let frames = deliver(&mut stack, &arp_request(MacAddr::BROADCAST, PEER_IP, stored));
    assert_eq!(frames.len(), 1);
}

#[test]
fn unknown_ethertype_is_dropped() {
    let (mut stack, events) = stack_with_app(config(), Reply::Nothing);
    let mut frame = Segment::from_peer(1, 0, TcpFlags::SYN).frame();
    // IPv6
    frame[12..14].copy_from_slice(&0x86ddu16.to_be_bytes());
    assert!(deliver(&mut stack, &frame).is_empty());
    assert!(events.borrow().is_empty());
}

#[test]
fn runt_frame_is_dropped() {
    let mut stack = stack();
    assert!(deliver(&mut stack, &[0xff; 10]).is_empty());
}
