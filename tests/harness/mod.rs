#![allow(dead_code)]

use encnet::chip::sim::SimChip;
use encnet::stack::ChannelId;
use encnet::wire::frame;
use encnet::wire::{Ipv4Addr, MacAddr, TcpFlags, TcpFrame, TcpFrameBuilder, TcpHeader};
use encnet::{ChipConfig, MemoryIpStore, NetStack, SpinLimit, StackConfig};

pub const BOARD_MAC: MacAddr = MacAddr([0x02, 0x45, 0x4e, 0x43, 0x00, 0x01]);
pub const HOST_MAC: MacAddr = MacAddr([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
pub const HOST_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

pub type Board = NetStack<SimChip, MemoryIpStore>;

pub fn board() -> Board {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let cfg = StackConfig {
        chip: ChipConfig {
            mac: BOARD_MAC,
            spin: SpinLimit::Bounded(10_000),
            ..ChipConfig::default()
        },
        ..StackConfig::default()
    };
    NetStack::new(SimChip::new(), MemoryIpStore::default(), cfg).unwrap()
}

/// One simulated remote host talking to the board.
pub struct Host {
    pub board_ip: Ipv4Addr,
    pub port: u16,
    pub board_port: u16,
    pub seq: u32,
    pub ack: u32,
}

/// A TCP segment as the board sent it, checksums verified.
#[derive(Debug)]
pub struct Reply {
    pub tcp: TcpHeader,
    pub payload: Vec<u8>,
}

impl Host {
    pub fn new(board_ip: Ipv4Addr, port: u16, board_port: u16) -> Self {
        Self {
            board_ip,
            port,
            board_port,
            seq: 7_000,
            ack: 0,
        }
    }

    fn frame(&self, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
        TcpFrameBuilder {
            src_port: self.port,
            dst_port: self.board_port,
            seq: self.seq,
            ack: self.ack,
            flags,
            window: 2048,
            payload,
            ..TcpFrameBuilder::new(HOST_MAC, BOARD_MAC, HOST_IP, self.board_ip)
        }
        .build_vec()
    }

    /// Sends one segment and returns the board's answers. Sequence numbers advance past what
    /// was sent and follow the board's last segment.
    pub fn send(&mut self, board: &mut Board, flags: TcpFlags, payload: &[u8]) -> Vec<Reply> {
        let frame = self.frame(flags, payload);
        assert!(board.chip_mut().bus_mut().inject_frame(&frame));
        assert!(board.poll().unwrap().packet_handled);

        self.seq = self.seq.wrapping_add(payload.len() as u32);
        if flags.intersects(TcpFlags::SYN | TcpFlags::FIN) {
            self.seq = self.seq.wrapping_add(1);
        }
        let replies: Vec<Reply> = board
            .chip_mut()
            .bus_mut()
            .take_transmitted()
            .iter()
            .map(|f| parse_reply(f))
            .collect();
        for r in &replies {
            assert_eq!(r.tcp.dst_port, self.port);
            assert_eq!(r.tcp.ack, self.seq);
            let mut next = r.tcp.seq.wrapping_add(r.payload.len() as u32);
            if r.tcp.flags.intersects(TcpFlags::SYN | TcpFlags::FIN) {
                next = next.wrapping_add(1);
            }
            self.ack = next;
        }
        replies
    }

    pub fn open(&mut self, board: &mut Board) -> ChannelId {
        let replies = self.send(board, TcpFlags::SYN, &[]);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].tcp.flags, TcpFlags::SYN | TcpFlags::ACK);
        board
            .channels()
            .iter()
            .find(|(_, ch)| ch.peer_port == self.port)
            .map(|(id, _)| id)
            .unwrap()
    }

    /// Sends a request and returns the concatenated payload of every reply.
    pub fn request(&mut self, board: &mut Board, payload: &[u8]) -> (Vec<u8>, Vec<Reply>) {
        let replies = self.send(board, TcpFlags::ACK | TcpFlags::PSH, payload);
        let body = replies.iter().flat_map(|r| r.payload.clone()).collect();
        (body, replies)
    }
}

pub fn parse_reply(frame: &[u8]) -> Reply {
    let sent = TcpFrame::parse(frame).expect("board sent a malformed TCP frame");
    assert_eq!(sent.eth.dst, HOST_MAC);
    assert_eq!(sent.eth.src, BOARD_MAC);
    assert_eq!(sent.ip.dst, HOST_IP);
    Reply {
        tcp: sent.tcp,
        payload: sent.payload,
    }
}

/// Resolves the board's MAC the way a host would before talking to it.
pub fn resolve(board: &mut Board, ip: Ipv4Addr) -> Option<MacAddr> {
    let frame = frame::arp_request_frame(MacAddr::BROADCAST, HOST_MAC, HOST_IP, ip);
    assert!(board.chip_mut().bus_mut().inject_frame(&frame));
    board.poll().unwrap();
    let sent = board.chip_mut().bus_mut().take_transmitted();
    let (_, reply) = frame::parse_arp_frame(sent.first()?)?;
    Some(reply.sender_mac)
}
