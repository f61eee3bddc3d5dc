//! Outcomes reported to the originator.

use crate::bus::Transfers;
use crate::error::Error;
use crate::types::{Id, Resp, User, DATA_BYTES};

/// One read data beat, delivered in address order.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBeat<const B: usize = DATA_BYTES> {
    pub id: Id,
    /// Index within the burst, from 0.
    pub index: usize,
    pub addr: u32,
    pub data: [u8; B],
    pub resp: Resp,
    pub user: User,
    pub last: bool,
}

/// Event keyed by transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<const B: usize = DATA_BYTES> {
    /// The write response was accepted. `resp` is passed through as is, errors included.
    WriteDone {
        /// Transaction id.
        id: Id,
        /// Response status.
        resp: Resp,
        /// User sideband of the response.
        user: User,
    },

    /// A read beat was accepted.
    ReadBeat(ReadBeat<B>),

    /// The final read beat was accepted.
    ReadDone {
        /// Transaction id.
        id: Id,
        /// Number of beats delivered.
        beats: usize,
    },

    /// The transaction was torn down after a protocol violation, and its id is free again.
    Aborted {
        /// Transaction id.
        id: Id,
        /// Always a [`Error::ProtocolViolation`].
        error: Error,
    },

    /// A response arrived for an id with no transaction in that direction. Nothing is torn down,
    /// so a live transaction of the other direction with the same id carries on.
    Unexpected {
        /// Id carried by the response.
        id: Id,
        /// Channel the response arrived on.
        channel: ResponseChannel,
    },
}

/// Response channel of an [`Event::Unexpected`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseChannel {
    B,
    R,
}

impl<const B: usize> Event<B> {
    /// Transaction id the event belongs to.
    pub fn id(&self) -> Id {
        match self {
            Event::WriteDone { id, .. }
            | Event::ReadDone { id, .. }
            | Event::Aborted { id, .. }
            | Event::Unexpected { id, .. } => *id,
            Event::ReadBeat(beat) => beat.id,
        }
    }
}

/// Counters of one master adapter.
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub writes_submitted: u64,
    pub reads_submitted: u64,
    pub writes_done: u64,
    pub reads_done: u64,
    pub cancelled: u64,
    pub aborted: u64,
    /// Responses for ids with no transaction in that direction.
    pub unexpected_responses: u64,
    /// Responses with `SlvErr` or `DecErr` status, counted per B response and per R beat.
    pub error_responses: u64,
    pub aw_transfers: u64,
    pub w_transfers: u64,
    pub b_transfers: u64,
    pub ar_transfers: u64,
    pub r_transfers: u64,
}

impl Stats {
    pub(crate) fn record_event<const B: usize>(&mut self, event: &Event<B>) {
        match event {
            Event::WriteDone { resp, .. } => {
                self.writes_done += 1;
                self.error_responses += u64::from(resp.is_error());
            }
            Event::ReadBeat(beat) => self.error_responses += u64::from(beat.resp.is_error()),
            Event::ReadDone { .. } => self.reads_done += 1,
            Event::Aborted { .. } => self.aborted += 1,
            Event::Unexpected { .. } => self.unexpected_responses += 1,
        }
    }

    pub(crate) fn record_transfers<const B: usize>(&mut self, fired: &Transfers<B>) {
        self.aw_transfers += u64::from(fired.aw.is_some());
        self.w_transfers += u64::from(fired.w.is_some());
        self.b_transfers += u64::from(fired.b.is_some());
        self.ar_transfers += u64::from(fired.ar.is_some());
        self.r_transfers += u64::from(fired.r.is_some());
    }
}
