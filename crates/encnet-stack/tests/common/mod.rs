#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use encnet_chip::sim::SimChip;
use encnet_chip::ChipConfig;
use encnet_chip::SpinLimit;
use encnet_stack::{
    Channel, ChannelId, Conn, MemoryIpStore, NetStack, Peer, StackConfig, StackError, TcpApp,
    DEFAULT_IP,
};
use encnet_wire::frame;
use encnet_wire::{Ipv4Addr, MacAddr, TcpFlags, TcpFrame, TcpFrameBuilder};

pub type Stack = NetStack<SimChip, MemoryIpStore>;

pub const STACK_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0xbe, 0xef]);
pub const STACK_IP: Ipv4Addr = DEFAULT_IP;
pub const PEER_MAC: MacAddr = MacAddr([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
pub const PEER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 2);
pub const APP_PORT: u16 = 80;
pub const PEER_PORT: u16 = 40_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn config() -> StackConfig {
    StackConfig {
        chip: ChipConfig {
            mac: STACK_MAC,
            spin: SpinLimit::Bounded(1_000),
            ..ChipConfig::default()
        },
        ..StackConfig::default()
    }
}

pub fn stack_with(cfg: StackConfig) -> Stack {
    init_tracing();
    NetStack::new(SimChip::new(), MemoryIpStore::default(), cfg).unwrap()
}

pub fn stack() -> Stack {
    stack_with(config())
}

/// Injects `frame`, polls once and returns what the stack transmitted.
pub fn deliver(stack: &mut Stack, frame: &[u8]) -> Vec<Vec<u8>> {
    assert!(stack.chip_mut().bus_mut().inject_frame(frame));
    let outcome = stack.poll().unwrap();
    assert!(outcome.packet_handled);
    assert_eq!(stack.chip().bus().pending_packets(), 0);
    stack.chip_mut().bus_mut().take_transmitted()
}

/// Raises one tick, polls and returns what was transmitted.
pub fn tick(stack: &mut Stack) -> Vec<Vec<u8>> {
    stack.tick();
    let outcome = stack.poll().unwrap();
    assert!(outcome.tick_handled);
    stack.chip_mut().bus_mut().take_transmitted()
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
    pub ip_options: Vec<u8>,
    pub tcp_options: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Peer-to-stack segment on the default ports.
    pub fn from_peer(seq: u32, ack: u32, flags: TcpFlags) -> Self {
        Self {
            src_ip: PEER_IP,
            dst_ip: STACK_IP,
            src_port: PEER_PORT,
            dst_port: APP_PORT,
            seq,
            ack,
            flags,
            ip_options: Vec::new(),
            tcp_options: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn port(mut self, src_port: u16) -> Self {
        self.src_port = src_port;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Full Ethernet frame, padded to the 60-byte minimum.
    pub fn frame(&self) -> Vec<u8> {
        TcpFrameBuilder {
            src_port: self.src_port,
            dst_port: self.dst_port,
            seq: self.seq,
            ack: self.ack,
            flags: self.flags,
            ip_options: &self.ip_options,
            tcp_options: &self.tcp_options,
            payload: &self.payload,
            ..TcpFrameBuilder::new(PEER_MAC, STACK_MAC, self.src_ip, self.dst_ip)
        }
        .build_vec()
    }
}

pub fn syn(seq: u32) -> Vec<u8> {
    Segment::from_peer(seq, 0, TcpFlags::SYN).frame()
}

pub fn arp_request(dst: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    frame::arp_request_frame(dst, PEER_MAC, sender_ip, target_ip)
}

/// A TCP frame the stack sent, with its checksums already verified.
pub type Sent = TcpFrame;

pub fn parse_tcp(frame: &[u8]) -> Sent {
    let sent = TcpFrame::parse(frame).expect("not a TCP frame with valid checksums");
    assert_eq!(sent.ip.version_ihl, 0x45);
    sent
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(ChannelId, Peer),
    Receive(ChannelId, Vec<u8>),
    Disconnect(ChannelId),
}

/// What the recording application does with a received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    /// Sends the payload back upper-cased.
    Echo,
    /// Sends the payload back, then to every other channel.
    Broadcast,
    Close,
    Fail,
}

pub struct Recorder {
    pub events: Rc<RefCell<Vec<Event>>>,
    pub accept: bool,
    pub reply: Reply,
}

impl Recorder {
    pub fn new(reply: Reply) -> (Self, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: events.clone(),
                accept: true,
                reply,
            },
            events,
        )
    }
}

impl TcpApp<SimChip> for Recorder {
    fn connect(&mut self, id: ChannelId, peer: &Peer) -> bool {
        self.events.borrow_mut().push(Event::Connect(id, *peer));
        self.accept
    }

    fn receive(&mut self, conn: &mut Conn<'_, SimChip>) -> encnet_stack::Result<()> {
        let mut payload = vec![0u8; conn.rx().remaining() as usize];
        let n = conn.rx().read(&mut payload);
        payload.truncate(n);
        self.events
            .borrow_mut()
            .push(Event::Receive(conn.id(), payload.clone()));
        if payload.is_empty() {
            return Ok(());
        }
        match self.reply {
            Reply::Nothing => Ok(()),
            Reply::Echo => {
                conn.respond(TcpFlags::ACK | TcpFlags::PSH, &payload.to_ascii_uppercase())
            }
            Reply::Broadcast => {
                conn.respond(TcpFlags::ACK | TcpFlags::PSH, &payload)?;
                let others: Vec<ChannelId> = conn.channels().map(|(id, _)| id).collect();
                for other in others {
                    conn.resend_to(other, TcpFlags::ACK | TcpFlags::PSH)?;
                }
                Ok(())
            }
            Reply::Close => conn.close(),
            Reply::Fail => Err(StackError::App("refusing payload".into())),
        }
    }

    fn disconnect(&mut self, id: ChannelId, _channel: &Channel) {
        self.events.borrow_mut().push(Event::Disconnect(id));
    }
}

/// Stack with a recording application on [`APP_PORT`].
pub fn stack_with_app(cfg: StackConfig, reply: Reply) -> (Stack, Rc<RefCell<Vec<Event>>>) {
    let mut stack = stack_with(cfg);
    let (app, events) = Recorder::new(reply);
    stack.register_app(APP_PORT, Box::new(app)).unwrap();
    (stack, events)
}

/// Opens a channel from `port` and returns the stack's SYN+ACK.
pub fn connect(stack: &mut Stack, port: u16, seq: u32) -> Sent {
    let frame = Segment::from_peer(seq, 0, TcpFlags::SYN).port(port).frame();
    let frames = deliver(stack, &frame);
    assert_eq!(frames.len(), 1);
    parse_tcp(&frames[0])
}
