use std::net::{Ipv4Addr, Ipv6Addr};

use bitflags::bitflags;

/// One of the two views of a tracked flow.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Initiator to responder.
    Original = 0,
    /// Responder to initiator.
    Reply = 1,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Original, Direction::Reply];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Original => Self::Reply,
            Self::Reply => Self::Original,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Reply => "reply",
        }
    }
}

/// Layer 3 protocol, numbered after the `AF_*` address families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum L3Protocol {
    /// `AF_UNSPEC`. Acts as a wildcard when comparing tuples.
    #[default]
    Unspec,
    /// `AF_INET`
    Ipv4,
    /// `AF_INET6`
    Ipv6,
    Other(u8),
}

impl L3Protocol {
    #[inline]
    pub fn is_unspec(&self) -> bool {
        matches!(self, Self::Unspec)
    }
}

impl From<u8> for L3Protocol {
    #[inline]
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Unspec,
            2 => Self::Ipv4,
            10 => Self::Ipv6,
            n => Self::Other(n),
        }
    }
}

impl From<L3Protocol> for u8 {
    #[inline]
    fn from(val: L3Protocol) -> u8 {
        match val {
            L3Protocol::Unspec => 0,
            L3Protocol::Ipv4 => 2,
            L3Protocol::Ipv6 => 10,
            L3Protocol::Other(n) => n,
        }
    }
}

/// Address storage shared by both families.
///
/// Holds four network endian words. An IPv4 address lives in the first
/// word and the remaining words are zero. Which family is meaningful is
/// recorded by the presence attributes of the owning record, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Addr {
    words: [u32; 4],
}

impl Addr {
    /// Builds an [Addr] from a v4 address represented as a network endian `u32`.
    pub fn v4(addr: u32) -> Self {
        Self {
            words: [addr, 0, 0, 0],
        }
    }

    /// Builds an [Addr] from a v6 address as an array of network endian `u32`.
    pub fn v6(words: [u32; 4]) -> Self {
        Self { words }
    }

    #[inline]
    pub fn as_v4(&self) -> u32 {
        self.words[0]
    }

    #[inline]
    pub fn as_v6(&self) -> &[u32; 4] {
        &self.words
    }

    pub fn to_ipv4(&self) -> Ipv4Addr {
        self.words[0].to_ne_bytes().into()
    }

    pub fn to_ipv6(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        for (chunk, word) in octets.chunks_exact_mut(4).zip(self.words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        octets.into()
    }
}

impl From<Ipv4Addr> for Addr {
    fn from(ip: Ipv4Addr) -> Self {
        Self::v4(u32::from_ne_bytes(ip.octets()))
    }
}

impl From<Ipv6Addr> for Addr {
    fn from(ip: Ipv6Addr) -> Self {
        let octets = ip.octets();
        let mut words = [0u32; 4];
        for (word, chunk) in words.iter_mut().zip(octets.chunks_exact(4)) {
            *word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::v6(words)
    }
}

/// The address/protocol tuple describing one direction of a flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tuple {
    pub l3proto: L3Protocol,
    /// IANA protocol number.
    pub l4proto: u8,
    pub src: Addr,
    pub dst: Addr,
    /// Source port (host endian).
    pub sport: u16,
    /// Destination port (host endian).
    pub dport: u16,
}

/// TCP connection tracking sub-state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TcpState {
    #[default]
    None = 0,
    SynSent = 1,
    SynRecv = 2,
    Established = 3,
    FinWait = 4,
    CloseWait = 5,
    LastAck = 6,
    TimeWait = 7,
    Close = 8,
    SynSent2 = 9,
}

impl TcpState {
    const ALL: [TcpState; 10] = [
        Self::None,
        Self::SynSent,
        Self::SynRecv,
        Self::Established,
        Self::FinWait,
        Self::CloseWait,
        Self::LastAck,
        Self::TimeWait,
        Self::Close,
        Self::SynSent2,
    ];

    /// Name as printed by conntrack dumps.
    pub fn display(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::SynSent => "SYN_SENT",
            Self::SynRecv => "SYN_RECV",
            Self::Established => "ESTABLISHED",
            Self::FinWait => "FIN_WAIT",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::TimeWait => "TIME_WAIT",
            Self::Close => "CLOSE",
            Self::SynSent2 => "SYN_SENT2",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.display() == name)
    }
}

bitflags! {
    /// Connection status bits, numbered as the kernel's `IPS_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u32 {
        const EXPECTED = 1 << 0;
        const SEEN_REPLY = 1 << 1;
        const ASSURED = 1 << 2;
        const CONFIRMED = 1 << 3;
        const SRC_NAT = 1 << 4;
        const DST_NAT = 1 << 5;
        const SEQ_ADJUST = 1 << 6;
        const SRC_NAT_DONE = 1 << 7;
        const DST_NAT_DONE = 1 << 8;
        const DYING = 1 << 9;
        const FIXED_TIMEOUT = 1 << 10;
        const TEMPLATE = 1 << 11;
        const UNTRACKED = 1 << 12;
        const HELPER = 1 << 13;
        const OFFLOAD = 1 << 14;
        const HW_OFFLOAD = 1 << 15;
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::empty()
    }
}

impl Status {
    /// Returns `true` when every bit set in `self` is also set in `other`.
    #[inline]
    pub fn is_subset(&self, other: Status) -> bool {
        (self.bits() & other.bits()) == self.bits()
    }
}
