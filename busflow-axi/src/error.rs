//! Errors of the AXI master.

use busflow::ChannelError;
use thiserror::Error;

use crate::types::Id;

/// Ways a counterparty can break the AXI4 ordering and beat-count rules.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("response before the address handshake completed")]
    ResponseBeforeAddress,

    #[error("write response after {sent} of {expected} data beats")]
    EarlyWriteResponse { sent: usize, expected: usize },

    #[error("last asserted on beat {beat} of {expected}")]
    PrematureLast { beat: usize, expected: usize },

    #[error("last missing on final beat {expected}")]
    MissingLast { expected: usize },
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The counterparty broke an ordering or beat-count rule. Fatal to the transaction.
    #[error("protocol violation on id {id}: {violation}")]
    ProtocolViolation { id: Id, violation: Violation },

    /// Another transaction with this id is still outstanding.
    #[error("id {id} is already in use")]
    IdInUse { id: Id },

    /// The request is malformed and was rejected before any channel activity.
    #[error("invalid burst configuration: {reason}")]
    InvalidBurstConfig { reason: &'static str },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },

    /// Internal consistency error: no entry for this id.
    #[error("id {id} is not tracked")]
    UnknownId { id: Id },

    /// Internal consistency error: more beats than the burst length.
    #[error("id {id}: beat overrun, burst has {expected} beats")]
    BeatOverrun { id: Id, expected: usize },

    /// Internal consistency error: completion with beats still missing.
    #[error("id {id}: completed {completed} of {expected} beats")]
    Incomplete { id: Id, completed: usize, expected: usize },

    #[error("tracker is full ({capacity} outstanding transactions)")]
    TrackerFull { capacity: usize },

    #[error("no free transaction id")]
    NoFreeId,

    /// The address handshake (or a write data beat) was already accepted.
    #[error("id {id} can no longer be cancelled")]
    CancelRejected { id: Id },

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl Error {
    /// Whether the error indicates a bug in the controller rather than a bad request or a
    /// misbehaving counterparty.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::UnknownId { .. } | Error::BeatOverrun { .. } | Error::Incomplete { .. })
    }
}
