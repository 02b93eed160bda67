use std::net::IpAddr;

use crate::attr::{Attr, AttrSet, TupleAttr};
use crate::types::{Addr, Direction, L3Protocol, Status, TcpState, Tuple};

/// A tracked connection as seen by a dump or an event.
///
/// Fields are only meaningful when the matching [Attr] is set. Setters
/// store the value and mark it present, [unset](Self::unset) forgets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionRecord {
    tuples: [Tuple; 2],
    id: u32,
    mark: u32,
    timeout: u32,
    status: Status,
    tcp_state: TcpState,
    set: AttrSet,
}

#[derive(Clone, Copy)]
enum Endpoint {
    Src,
    Dst,
}

impl ConnectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn attrs(&self) -> &AttrSet {
        &self.set
    }

    #[inline]
    pub fn is_set(&self, attr: Attr) -> bool {
        self.set.contains(attr)
    }

    #[inline]
    pub fn tuple(&self, dir: Direction) -> &Tuple {
        &self.tuples[dir.index()]
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn mark(&self) -> u32 {
        self.mark
    }

    /// Timeout in seconds.
    #[inline]
    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    #[inline]
    pub fn tcp_state(&self) -> TcpState {
        self.tcp_state
    }

    pub fn set_l3proto(&mut self, dir: Direction, proto: L3Protocol) -> &mut Self {
        self.tuples[dir.index()].l3proto = proto;
        self.set.insert(Attr::Tuple(dir, TupleAttr::L3Proto));
        self
    }

    pub fn set_l4proto(&mut self, dir: Direction, proto: u8) -> &mut Self {
        self.tuples[dir.index()].l4proto = proto;
        self.set.insert(Attr::Tuple(dir, TupleAttr::L4Proto));
        self
    }

    /// Sets the source address, marking the attribute of its family and
    /// forgetting the other one.
    pub fn set_src(&mut self, dir: Direction, addr: IpAddr) -> &mut Self {
        self.set_addr(dir, Endpoint::Src, addr)
    }

    /// Sets the destination address, marking the attribute of its family and
    /// forgetting the other one.
    pub fn set_dst(&mut self, dir: Direction, addr: IpAddr) -> &mut Self {
        self.set_addr(dir, Endpoint::Dst, addr)
    }

    pub fn set_sport(&mut self, dir: Direction, port: u16) -> &mut Self {
        self.tuples[dir.index()].sport = port;
        self.set.insert(Attr::Tuple(dir, TupleAttr::PortSrc));
        self
    }

    pub fn set_dport(&mut self, dir: Direction, port: u16) -> &mut Self {
        self.tuples[dir.index()].dport = port;
        self.set.insert(Attr::Tuple(dir, TupleAttr::PortDst));
        self
    }

    pub fn set_id(&mut self, id: u32) -> &mut Self {
        self.id = id;
        self.set.insert(Attr::Id);
        self
    }

    pub fn set_mark(&mut self, mark: u32) -> &mut Self {
        self.mark = mark;
        self.set.insert(Attr::Mark);
        self
    }

    pub fn set_timeout(&mut self, secs: u32) -> &mut Self {
        self.timeout = secs;
        self.set.insert(Attr::Timeout);
        self
    }

    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = status;
        self.set.insert(Attr::Status);
        self
    }

    pub fn set_tcp_state(&mut self, state: TcpState) -> &mut Self {
        self.tcp_state = state;
        self.set.insert(Attr::TcpState);
        self
    }

    /// Marks `attr` as unknown. The stored value is left untouched.
    pub fn unset(&mut self, attr: Attr) -> &mut Self {
        self.set.remove(attr);
        self
    }

    fn set_addr(&mut self, dir: Direction, endpoint: Endpoint, addr: IpAddr) -> &mut Self {
        let (v4, v6) = match endpoint {
            Endpoint::Src => (TupleAttr::Ipv4Src, TupleAttr::Ipv6Src),
            Endpoint::Dst => (TupleAttr::Ipv4Dst, TupleAttr::Ipv6Dst),
        };
        let (stored, present, cleared) = match addr {
            IpAddr::V4(ip) => (Addr::from(ip), v4, v6),
            IpAddr::V6(ip) => (Addr::from(ip), v6, v4),
        };

        let tuple = &mut self.tuples[dir.index()];
        match endpoint {
            Endpoint::Src => tuple.src = stored,
            Endpoint::Dst => tuple.dst = stored,
        }
        self.set.insert(Attr::Tuple(dir, present));
        self.set.remove(Attr::Tuple(dir, cleared));
        self
    }
}
