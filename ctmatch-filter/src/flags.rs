use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::{frontend::policy_parser, Error};

bitflags! {
    /// Comparison policy: which parts of two records are compared, and how
    /// timeouts relate when metadata is compared.
    ///
    /// A policy without any of `FULL`, `ORIGINAL` or `REPLY` compares
    /// everything, as if `FULL` was set. Timeout relations are only looked at
    /// in that full scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompareFlags: u32 {
        /// Compare the original tuple.
        const ORIGINAL = 1 << 0;
        /// Compare the reply tuple.
        const REPLY = 1 << 1;
        /// Timeouts match when `a == b`.
        const TIMEOUT_EQ = 1 << 2;
        /// Timeouts match when `a > b`.
        const TIMEOUT_GT = 1 << 3;
        /// Timeouts match when `a < b`.
        const TIMEOUT_LT = 1 << 4;
        /// Compare metadata and both tuples.
        const FULL = 1 << 5;

        const TIMEOUT_GE = Self::TIMEOUT_EQ.bits() | Self::TIMEOUT_GT.bits();
        const TIMEOUT_LE = Self::TIMEOUT_EQ.bits() | Self::TIMEOUT_LT.bits();
        /// Any relational timeout mode.
        const TIMEOUT_ANY = Self::TIMEOUT_EQ.bits() | Self::TIMEOUT_GT.bits() | Self::TIMEOUT_LT.bits();
    }
}

impl CompareFlags {
    const SCOPE: Self = Self::FULL.union(Self::ORIGINAL).union(Self::REPLY);

    /// Whether metadata and both tuples are compared.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.contains(Self::FULL) || !self.intersects(Self::SCOPE)
    }

    /// The requested timeout relations, empty when timeouts must be equal.
    #[inline]
    pub fn timeout_relations(&self) -> Self {
        self.intersection(Self::TIMEOUT_ANY)
    }
}

impl Default for CompareFlags {
    fn default() -> Self {
        Self::FULL
    }
}

impl FromStr for CompareFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        policy_parser::policy(s).map_err(Error::Policy)
    }
}

/// Canonical policy expression. Parses back to an equivalent policy.
impl fmt::Display for CompareFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms = Vec::with_capacity(4);

        if self.contains(Self::FULL) || !self.intersects(Self::SCOPE | Self::TIMEOUT_ANY) {
            terms.push("all".to_owned());
        } else {
            if self.contains(Self::ORIGINAL) {
                terms.push("orig".to_owned());
            }
            if self.contains(Self::REPLY) {
                terms.push("repl".to_owned());
            }
        }

        let relations = [
            (Self::TIMEOUT_EQ, "eq"),
            (Self::TIMEOUT_GT, "gt"),
            (Self::TIMEOUT_LT, "lt"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect::<Vec<_>>();

        if !relations.is_empty() {
            terms.push(format!("timeout[{}]", relations.join("|")));
        }

        write!(f, "{}", terms.join(" and "))
    }
}
