//! Connection tracking record types.
//!
//! Records are populated by decoders (netlink, text dumps, ...) and only read
//! by the matcher. Every setter on [ConnectionRecord] marks the matching
//! [Attr] present, which is what distinguishes an unknown field from a zero.

mod attr;
mod record;
pub mod types;

pub use attr::*;
pub use record::*;
pub use types::*;
