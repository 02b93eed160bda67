//! Selective equality of connection records.
//!
//! Two records are compared attribute by attribute, and an attribute is
//! only looked at when it is set on both sides. Anything else is a
//! wildcard, so a sparse record acts as a pattern:
//!
//! ```
//! use std::net::Ipv4Addr;
//!
//! use ctmatch_common::{ConnectionRecord, Direction};
//! use ctmatch_filter::{compare, CompareFlags};
//!
//! let mut flow = ConnectionRecord::new();
//! flow.set_l4proto(Direction::Original, 6)
//!     .set_src(Direction::Original, Ipv4Addr::new(10, 0, 0, 1).into())
//!     .set_dst(Direction::Original, Ipv4Addr::new(1, 1, 1, 1).into())
//!     .set_timeout(431999);
//!
//! let mut pattern = ConnectionRecord::new();
//! pattern.set_dst(Direction::Original, Ipv4Addr::new(1, 1, 1, 1).into());
//!
//! assert!(compare(&pattern, &flow, CompareFlags::ORIGINAL));
//! ```

use std::cmp::Ordering;

use ctmatch_common::{Attr, Direction, Tuple, TupleAttr};
use log::trace;

use crate::{CompareFlags, Comparable, Error};

/// Tuple attributes taking part in tuple equality, in evaluation order.
/// Ports are carried by records but never compared.
const TUPLE_FIELDS: [TupleAttr; 6] = [
    TupleAttr::L3Proto,
    TupleAttr::L4Proto,
    TupleAttr::Ipv4Src,
    TupleAttr::Ipv4Dst,
    TupleAttr::Ipv6Src,
    TupleAttr::Ipv6Dst,
];

/// Metadata attributes, in evaluation order.
const META_FIELDS: [Attr; 5] = [
    Attr::Id,
    Attr::Mark,
    Attr::Timeout,
    Attr::Status,
    Attr::TcpState,
];

/// A compiled comparison policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TupleMatcher {
    flags: CompareFlags,
}

impl TupleMatcher {
    pub fn new(flags: CompareFlags) -> Self {
        Self { flags }
    }

    /// Builds a matcher from a policy expression such as `orig and repl`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        input.parse().map(Self::new)
    }

    pub fn flags(&self) -> CompareFlags {
        self.flags
    }

    pub fn matches<A, B>(&self, a: &A, b: &B) -> bool
    where
        A: Comparable + ?Sized,
        B: Comparable + ?Sized,
    {
        compare(a, b, self.flags)
    }
}

/// Returns whether `a` matches `b` under the policy `flags`.
///
/// In full scope (see [CompareFlags::is_full]) metadata and both tuples
/// must match. Otherwise only the requested tuples are compared and
/// metadata is ignored, timeout relations included.
///
/// The result is symmetric in `a` and `b` except for the status flags,
/// where the status of `a` must be a subset of the status of `b`.
pub fn compare<A, B>(a: &A, b: &B, flags: CompareFlags) -> bool
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    if flags.is_full() {
        return meta_equal(a, b, flags)
            && tuple_equal(a, b, Direction::Original)
            && tuple_equal(a, b, Direction::Reply);
    }

    if flags.contains(CompareFlags::ORIGINAL) && !tuple_equal(a, b, Direction::Original) {
        return false;
    }

    if flags.contains(CompareFlags::REPLY) && !tuple_equal(a, b, Direction::Reply) {
        return false;
    }

    true
}

/// Compares the tuples of direction `dir`.
pub fn tuple_equal<A, B>(a: &A, b: &B, dir: Direction) -> bool
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    let (ta, tb) = (a.tuple(dir), b.tuple(dir));

    for field in TUPLE_FIELDS {
        if both(a, b, Attr::Tuple(dir, field)) && !tuple_field_equal(field, ta, tb) {
            trace!("{} tuple mismatch on {:?}", dir.display(), field);
            return false;
        }
    }

    true
}

/// Compares id, mark, timeout, status and TCP state.
pub fn meta_equal<A, B>(a: &A, b: &B, flags: CompareFlags) -> bool
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    for attr in META_FIELDS {
        if both(a, b, attr) && !meta_field_equal(attr, a, b, flags) {
            trace!("metadata mismatch on {:?}", attr);
            return false;
        }
    }

    true
}

/// Whether `attr` is set on both records.
#[inline]
pub fn both<A, B>(a: &A, b: &B, attr: Attr) -> bool
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    a.is_set(attr) && b.is_set(attr)
}

fn tuple_field_equal(field: TupleAttr, a: &Tuple, b: &Tuple) -> bool {
    match field {
        // unspecified family is a wildcard
        TupleAttr::L3Proto => {
            a.l3proto.is_unspec() || b.l3proto.is_unspec() || a.l3proto == b.l3proto
        }
        TupleAttr::L4Proto => a.l4proto == b.l4proto,
        TupleAttr::Ipv4Src => a.src.as_v4() == b.src.as_v4(),
        TupleAttr::Ipv4Dst => a.dst.as_v4() == b.dst.as_v4(),
        TupleAttr::Ipv6Src => a.src.as_v6() == b.src.as_v6(),
        TupleAttr::Ipv6Dst => a.dst.as_v6() == b.dst.as_v6(),
        TupleAttr::PortSrc | TupleAttr::PortDst => true,
    }
}

fn meta_field_equal<A, B>(attr: Attr, a: &A, b: &B, flags: CompareFlags) -> bool
where
    A: Comparable + ?Sized,
    B: Comparable + ?Sized,
{
    match attr {
        Attr::Id => a.id() == b.id(),
        Attr::Mark => a.mark() == b.mark(),
        Attr::Timeout => timeout_holds(a.timeout(), b.timeout(), flags),
        Attr::Status => a.status().is_subset(b.status()),
        Attr::TcpState => a.tcp_state() == b.tcp_state(),
        Attr::Tuple(..) => true,
    }
}

/// Exact equality unless the policy asks for relations, in which case any
/// one of them holding is enough.
fn timeout_holds(a: u32, b: u32, flags: CompareFlags) -> bool {
    let relations = flags.timeout_relations();
    if relations.is_empty() {
        return a == b;
    }

    let actual = match a.cmp(&b) {
        Ordering::Greater => CompareFlags::TIMEOUT_GT,
        Ordering::Less => CompareFlags::TIMEOUT_LT,
        Ordering::Equal => CompareFlags::TIMEOUT_EQ,
    };
    relations.contains(actual)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use ctmatch_common::{ConnectionRecord, L3Protocol, Status, TcpState};

    use super::*;

    use Direction::*;

    const FULL: CompareFlags = CompareFlags::FULL;
    const ORIG: CompareFlags = CompareFlags::ORIGINAL;
    const REPL: CompareFlags = CompareFlags::REPLY;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        Ipv4Addr::new(a, b, c, d).into()
    }

    fn v6(s: &str) -> IpAddr {
        s.parse::<Ipv6Addr>().unwrap().into()
    }

    /// tcp 10.0.0.1:50000 -> 1.1.1.1:443, fully populated.
    fn https_flow() -> ConnectionRecord {
        let mut ct = ConnectionRecord::new();
        for dir in Direction::ALL {
            ct.set_l3proto(dir, L3Protocol::Ipv4).set_l4proto(dir, 6);
        }
        ct.set_src(Original, v4(10, 0, 0, 1))
            .set_dst(Original, v4(1, 1, 1, 1))
            .set_sport(Original, 50000)
            .set_dport(Original, 443)
            .set_src(Reply, v4(1, 1, 1, 1))
            .set_dst(Reply, v4(10, 0, 0, 1))
            .set_sport(Reply, 443)
            .set_dport(Reply, 50000)
            .set_id(7)
            .set_mark(0)
            .set_timeout(431999)
            .set_status(Status::SEEN_REPLY | Status::ASSURED | Status::CONFIRMED)
            .set_tcp_state(TcpState::Established);
        ct
    }

    #[test]
    fn identical_records_match() {
        let ct = https_flow();
        for flags in [FULL, ORIG, REPL, ORIG | REPL, CompareFlags::empty()] {
            assert!(compare(&ct, &ct, flags), "{:?}", flags);
        }
    }

    #[test]
    fn empty_records_match_anything() {
        let ct = https_flow();
        let empty = ConnectionRecord::new();
        assert!(compare(&empty, &ct, FULL));
        assert!(compare(&ct, &empty, FULL));
        assert!(compare(&empty, &empty, FULL));
    }

    #[test]
    fn absent_attributes_are_dont_care() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_mark(42).unset(Attr::Mark);
        b.set_src(Original, v4(192, 168, 0, 1))
            .unset(Attr::orig(TupleAttr::Ipv4Src));
        b.set_l4proto(Reply, 17).unset(Attr::repl(TupleAttr::L4Proto));

        assert!(compare(&a, &b, FULL));
        assert!(compare(&b, &a, FULL));

        // and the same when the attribute is missing on the other side
        let mut a = https_flow();
        a.unset(Attr::Id);
        let mut b = https_flow();
        b.set_id(1000);
        assert!(compare(&a, &b, FULL));
    }

    #[test]
    fn l3proto_unspec_is_wildcard() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_l3proto(Original, L3Protocol::Unspec);
        assert!(compare(&a, &b, ORIG));
        assert!(compare(&b, &a, ORIG));

        b.set_l3proto(Original, L3Protocol::Ipv6);
        assert!(!compare(&a, &b, ORIG));
        assert!(!compare(&b, &a, ORIG));

        b.set_l3proto(Original, L3Protocol::Other(7));
        assert!(!compare(&a, &b, ORIG));
    }

    #[test]
    fn l4proto() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_l4proto(Reply, 17);
        assert!(compare(&a, &b, ORIG));
        assert!(!compare(&a, &b, REPL));
        assert!(!compare(&a, &b, FULL));
    }

    #[test]
    fn ipv4_addresses() {
        let a = https_flow();

        let mut b = https_flow();
        b.set_src(Original, v4(10, 0, 0, 1));
        assert!(compare(&a, &b, ORIG));

        b.set_src(Original, v4(10, 0, 0, 2));
        assert!(!compare(&a, &b, ORIG));

        let mut b = https_flow();
        b.set_dst(Reply, v4(10, 0, 0, 2));
        assert!(compare(&a, &b, ORIG));
        assert!(!compare(&a, &b, REPL));
    }

    #[test]
    fn ipv6_addresses_match_when_equal() {
        let mut a = ConnectionRecord::new();
        a.set_src(Original, v6("2001:db8::1"))
            .set_dst(Original, v6("2001:db8::2"));

        let mut b = a;
        assert!(compare(&a, &b, ORIG));
        assert!(compare(&a, &b, FULL));

        b.set_src(Original, v6("2001:db8::3"));
        assert!(!compare(&a, &b, ORIG));

        let mut b = a;
        b.set_dst(Original, v6("2001:db8::1:2"));
        assert!(!compare(&a, &b, ORIG));
        assert!(!compare(&a, &b, FULL));
        assert!(compare(&a, &b, REPL));
    }

    #[test]
    fn address_families_do_not_cross() {
        let mut a = ConnectionRecord::new();
        a.set_src(Original, v4(10, 0, 0, 1));
        let mut b = ConnectionRecord::new();
        b.set_src(Original, v6("::a00:1"));

        // one side has only the v4 attribute, the other only the v6 one
        assert!(compare(&a, &b, ORIG));
    }

    #[test]
    fn ports_are_not_compared() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_sport(Original, 1).set_dport(Reply, 2);
        assert!(compare(&a, &b, FULL));
    }

    #[test]
    fn scope_isolation() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_l3proto(Reply, L3Protocol::Ipv6)
            .set_l4proto(Reply, 17)
            .set_src(Reply, v4(8, 8, 8, 8))
            .set_dst(Reply, v6("::1"));

        assert!(compare(&a, &b, ORIG));
        assert!(!compare(&a, &b, REPL));
        assert!(!compare(&a, &b, ORIG | REPL));
        assert!(!compare(&a, &b, FULL));
    }

    #[test]
    fn metadata_ignored_outside_full_scope() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_id(8)
            .set_mark(1)
            .set_timeout(1)
            .set_status(Status::empty())
            .set_tcp_state(TcpState::TimeWait);

        assert!(compare(&a, &b, ORIG | REPL));
        assert!(compare(&a, &b, ORIG | CompareFlags::TIMEOUT_EQ));
        assert!(!compare(&a, &b, FULL));
    }

    #[test]
    fn empty_policy_is_full() {
        let a = https_flow();
        let mut b = https_flow();
        b.set_mark(1);
        assert!(!compare(&a, &b, CompareFlags::empty()));
        assert!(!compare(&a, &b, CompareFlags::TIMEOUT_GT));
        assert!(compare(&a, &b, ORIG));
    }

    #[test]
    fn metadata_fields() {
        let a = https_flow();

        let mut b = https_flow();
        b.set_id(8);
        assert!(!compare(&a, &b, FULL));

        let mut b = https_flow();
        b.set_mark(1);
        assert!(!compare(&a, &b, FULL));

        let mut b = https_flow();
        b.set_tcp_state(TcpState::FinWait);
        assert!(!compare(&a, &b, FULL));
    }

    #[test]
    fn status_is_a_subset_test() {
        let mut a = ConnectionRecord::new();
        a.set_status(Status::SEEN_REPLY);
        let mut b = ConnectionRecord::new();
        b.set_status(Status::SEEN_REPLY | Status::ASSURED);

        // compare() with FULL is not symmetric once status is involved
        assert!(compare(&a, &b, FULL));
        assert!(!compare(&b, &a, FULL));

        let mut c = ConnectionRecord::new();
        c.set_status(Status::ASSURED);
        assert!(!compare(&a, &c, FULL));
        assert!(!compare(&c, &a, FULL));
    }

    #[test]
    fn timeout_exact_by_default() {
        let mut a = ConnectionRecord::new();
        a.set_timeout(100);
        let mut b = ConnectionRecord::new();
        b.set_timeout(50);

        assert!(!compare(&a, &b, FULL));
        assert!(compare(&a, &a, FULL));
    }

    #[test]
    fn timeout_relations() {
        let mut a = ConnectionRecord::new();
        a.set_timeout(100);
        let mut b = ConnectionRecord::new();
        b.set_timeout(50);

        let gt = FULL | CompareFlags::TIMEOUT_GT;
        let lt = FULL | CompareFlags::TIMEOUT_LT;
        let eq = FULL | CompareFlags::TIMEOUT_EQ;

        assert!(compare(&a, &b, gt));
        assert!(!compare(&b, &a, gt));
        assert!(compare(&b, &a, lt));
        assert!(!compare(&a, &b, lt));
        assert!(!compare(&a, &b, eq));
        assert!(compare(&a, &a, eq));

        let ge = FULL | CompareFlags::TIMEOUT_GE;
        assert!(compare(&a, &b, ge));
        assert!(compare(&a, &a, ge));
        assert!(!compare(&b, &a, ge));

        let any = FULL | CompareFlags::TIMEOUT_ANY;
        assert!(compare(&a, &b, any));
        assert!(compare(&b, &a, any));
        assert!(compare(&a, &a, any));

        // gt or lt, but not eq
        let ne = FULL | CompareFlags::TIMEOUT_GT | CompareFlags::TIMEOUT_LT;
        assert!(compare(&a, &b, ne));
        assert!(!compare(&a, &a, ne));
    }

    #[test]
    fn matcher_from_expression() {
        let matcher = TupleMatcher::parse("all and timeout[gt]").unwrap();
        assert_eq!(matcher.flags(), FULL | CompareFlags::TIMEOUT_GT);

        let mut a = https_flow();
        a.set_timeout(100);
        let mut b = https_flow();
        b.set_timeout(50);
        assert!(matcher.matches(&a, &b));
        assert!(!matcher.matches(&b, &a));

        assert!(TupleMatcher::parse("orig or repl").is_err());
        assert_eq!(TupleMatcher::default().flags(), FULL);
    }
}
