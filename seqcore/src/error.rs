//! Error taxonomy for the load/save and user-edit boundary.
//!
//! Engine-internal faults (queue overflow, a stale event at fire time, an
//! invalid pattern pointer) are never surfaced here: they are absorbed
//! silently so the tick/frame path never errors. Only parsing, validation,
//! checksum verification and route-conflict detection produce a
//! [`SeqError`].

use core::fmt::{self, Display, Formatter};

use heapless::String;

/// Message capacity for a parse/validation diagnostic. Long enough for a
/// full Teletype script line plus a short reason.
pub type Msg = String<64>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeqError {
    /// A Teletype script command line failed to parse. The offending line
    /// is skipped and playback continues.
    Parse(Msg),
    /// A parsed script command failed validation.
    Validation(Msg),
    /// A project or scale file's checksum did not match its contents.
    InvalidChecksum,
    /// Two routes target the same parameter on the same track. Carries the
    /// index of the route already committed that the new one conflicts with.
    ConflictingRoute { existing_route_index: usize },
}

impl Display for SeqError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SeqError::Parse(msg) => write!(f, "parse error: {msg}"),
            SeqError::Validation(msg) => write!(f, "validation error: {msg}"),
            SeqError::InvalidChecksum => write!(f, "INVALID_CHECKSUM"),
            SeqError::ConflictingRoute { existing_route_index } => {
                write!(f, "route conflicts with route {existing_route_index}")
            }
        }
    }
}
