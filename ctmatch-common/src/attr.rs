use crate::types::Direction;

/// Attributes of a [Tuple](crate::Tuple), identified independently of the direction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleAttr {
    L3Proto = 0,
    L4Proto = 1,
    Ipv4Src = 2,
    Ipv4Dst = 3,
    Ipv6Src = 4,
    Ipv6Dst = 5,
    PortSrc = 6,
    PortDst = 7,
}

impl TupleAttr {
    pub const COUNT: u32 = 8;

    pub const ALL: [TupleAttr; 8] = [
        Self::L3Proto,
        Self::L4Proto,
        Self::Ipv4Src,
        Self::Ipv4Dst,
        Self::Ipv6Src,
        Self::Ipv6Dst,
        Self::PortSrc,
        Self::PortDst,
    ];
}

/// Identifier of an attribute that may or may not be set on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Tuple(Direction, TupleAttr),
    Id,
    Mark,
    Timeout,
    Status,
    TcpState,
}

const META_BASE: u32 = 2 * TupleAttr::COUNT;
const META: [Attr; 5] = [Attr::Id, Attr::Mark, Attr::Timeout, Attr::Status, Attr::TcpState];

impl Attr {
    /// Number of distinct attributes.
    pub const COUNT: u32 = META_BASE + META.len() as u32;

    #[inline]
    pub const fn orig(attr: TupleAttr) -> Self {
        Self::Tuple(Direction::Original, attr)
    }

    #[inline]
    pub const fn repl(attr: TupleAttr) -> Self {
        Self::Tuple(Direction::Reply, attr)
    }

    #[inline]
    fn bit(self) -> u32 {
        match self {
            Self::Tuple(dir, attr) => dir as u32 * TupleAttr::COUNT + attr as u32,
            Self::Id => META_BASE,
            Self::Mark => META_BASE + 1,
            Self::Timeout => META_BASE + 2,
            Self::Status => META_BASE + 3,
            Self::TcpState => META_BASE + 4,
        }
    }

    fn from_bit(bit: u32) -> Option<Self> {
        if bit < META_BASE {
            let dir = Direction::ALL[(bit / TupleAttr::COUNT) as usize];
            let attr = TupleAttr::ALL[(bit % TupleAttr::COUNT) as usize];
            Some(Self::Tuple(dir, attr))
        } else {
            META.get((bit - META_BASE) as usize).copied()
        }
    }
}

/// Presence bitset: which attributes were explicitly set on a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttrSet(u32);

impl AttrSet {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn insert(&mut self, attr: Attr) {
        self.0 |= 1 << attr.bit();
    }

    #[inline]
    pub fn remove(&mut self, attr: Attr) {
        self.0 &= !(1 << attr.bit());
    }

    #[inline]
    pub fn contains(&self, attr: Attr) -> bool {
        self.0 & (1 << attr.bit()) != 0
    }

    /// Attributes present in both sets.
    #[inline]
    pub fn intersection(&self, other: &AttrSet) -> AttrSet {
        Self(self.0 & other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Attr> + '_ {
        (0..Attr::COUNT)
            .filter(|bit| self.0 & (1 << bit) != 0)
            .filter_map(Attr::from_bit)
    }
}

impl FromIterator<Attr> for AttrSet {
    fn from_iter<I: IntoIterator<Item = Attr>>(iter: I) -> Self {
        let mut set = Self::new();
        for attr in iter {
            set.insert(attr);
        }
        set
    }
}
