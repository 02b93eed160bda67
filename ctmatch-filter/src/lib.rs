use ctmatch_common::{Attr, ConnectionRecord, Direction, Status, TcpState, Tuple};
use peg::{error::ParseError, str::LineCol};

mod flags;
mod frontend;
mod matcher;
mod record;

pub use flags::*;
pub use frontend::*;
pub use matcher::*;
pub use record::*;

/// Read access to a record for the matcher.
///
/// Getters may return anything when the attribute is not set, they are
/// never called for an attribute missing on either side.
pub trait Comparable {
    fn is_set(&self, attr: Attr) -> bool;

    fn tuple(&self, dir: Direction) -> &Tuple;

    fn id(&self) -> u32;

    fn mark(&self) -> u32;

    fn timeout(&self) -> u32;

    fn status(&self) -> Status;

    fn tcp_state(&self) -> TcpState;
}

impl Comparable for ConnectionRecord {
    #[inline]
    fn is_set(&self, attr: Attr) -> bool {
        ConnectionRecord::is_set(self, attr)
    }

    #[inline]
    fn tuple(&self, dir: Direction) -> &Tuple {
        ConnectionRecord::tuple(self, dir)
    }

    #[inline]
    fn id(&self) -> u32 {
        ConnectionRecord::id(self)
    }

    #[inline]
    fn mark(&self) -> u32 {
        ConnectionRecord::mark(self)
    }

    #[inline]
    fn timeout(&self) -> u32 {
        ConnectionRecord::timeout(self)
    }

    #[inline]
    fn status(&self) -> Status {
        ConnectionRecord::status(self)
    }

    #[inline]
    fn tcp_state(&self) -> TcpState {
        ConnectionRecord::tcp_state(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid policy: {0}")]
    Policy(ParseError<LineCol>),

    #[error("invalid record: {0}")]
    Record(ParseError<LineCol>),

    #[error("invalid {field} `{value}`")]
    Value { field: &'static str, value: String },

    #[error("unexpected `{0}`")]
    Unexpected(String),

    #[error("missing {0} tuple")]
    MissingTuple(&'static str),
}
