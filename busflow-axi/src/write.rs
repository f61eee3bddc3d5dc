//! Write path: AW and W handshakes per write, correlated with the B response.
//!
//! Writes are kept in submission order. The AW channel carries the oldest write whose address
//! was not accepted yet, and the W channel carries the beats of the oldest write with beats left
//! to send, so W beats of different writes never interleave. Data may stream before its address
//! is accepted.

use std::collections::VecDeque;

use arrayvec::ArrayVec;
use busflow::some_or;
use tracing::{debug, warn};

use crate::burst::{lane_strobe, BurstConfig};
use crate::bus::{Bus, Transfers};
use crate::error::{Error, Violation};
use crate::event::{Event, ResponseChannel};
use crate::tracker::Tracker;
use crate::types::{Id, Request, WriteData, WriteResp, MAX_BURST_LEN};

/// State of one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteState {
    /// Waiting for the AW channel.
    Idle,
    /// The request is on the AW channel. Data beats may already be streaming.
    AddressOffered,
    /// AW accepted, no data beat accepted yet.
    AddressAccepted,
    /// AW accepted, some data beats accepted.
    DataStreaming,
    /// AW and every data beat accepted; waiting for B.
    ResponsePending,
    /// B accepted.
    Done,
}

#[derive(Debug, Clone)]
struct WriteTxn<const B: usize> {
    req: Request,
    beats: ArrayVec<WriteData<B>, MAX_BURST_LEN>,
    aw_offered: bool,
    aw_accepted: bool,
    sent: usize,
    done: bool,
}

impl<const B: usize> WriteTxn<B> {
    fn new(req: Request, burst: &BurstConfig, data: Vec<[u8; B]>) -> Self {
        let len = burst.beats();
        let beats = burst
            .addrs()
            .zip(data)
            .enumerate()
            .map(|(index, (addr, data))| WriteData {
                id: req.id,
                data,
                strb: lane_strobe::<B>(addr, burst.size()),
                last: index + 1 == len,
                user: req.side.user,
            })
            .collect();
        Self { req, beats, aw_offered: false, aw_accepted: false, sent: 0, done: false }
    }

    fn id(&self) -> Id { self.req.id }

    fn has_data_left(&self) -> bool { self.sent < self.beats.len() }

    fn state(&self) -> WriteState {
        if self.done {
            WriteState::Done
        } else if !self.aw_accepted {
            if self.aw_offered {
                WriteState::AddressOffered
            } else {
                WriteState::Idle
            }
        } else if self.sent == 0 {
            WriteState::AddressAccepted
        } else if self.has_data_left() {
            WriteState::DataStreaming
        } else {
            WriteState::ResponsePending
        }
    }
}

/// Write path controller.
#[derive(Debug, Clone)]
pub struct WritePath<const B: usize> {
    txns: VecDeque<WriteTxn<B>>,
}

impl<const B: usize> Default for WritePath<B> {
    fn default() -> Self { Self { txns: VecDeque::new() } }
}

impl<const B: usize> WritePath<B> {
    /// Queues a write that the tracker already registered. `data` holds one entry per beat.
    pub fn push(&mut self, req: Request, burst: &BurstConfig, data: Vec<[u8; B]>) {
        debug_assert_eq!(data.len(), burst.beats());
        self.txns.push_back(WriteTxn::new(req, burst, data));
    }

    /// Number of writes in flight.
    pub fn len(&self) -> usize { self.txns.len() }

    /// Whether no write is in flight.
    pub fn is_empty(&self) -> bool { self.txns.is_empty() }

    /// State of the write with this id.
    pub fn state(&self, id: Id) -> Option<WriteState> { self.get(id).map(WriteTxn::state) }

    fn get(&self, id: Id) -> Option<&WriteTxn<B>> { self.txns.iter().find(|txn| txn.id() == id) }

    fn remove(&mut self, id: Id) -> Option<WriteTxn<B>> {
        let index = self.txns.iter().position(|txn| txn.id() == id)?;
        self.txns.remove(index)
    }

    /// Drops a write whose address was not accepted and whose data has not started.
    ///
    /// A payload of the write still stalled on the bus is withdrawn on the next drive.
    pub fn cancel(&mut self, id: Id) -> Result<(), Error> {
        let txn = some_or!(self.get(id), return Err(Error::UnknownId { id }));
        if txn.aw_accepted || txn.sent > 0 {
            return Err(Error::CancelRejected { id });
        }
        let _ = self.remove(id);
        debug!(%id, "write cancelled");
        Ok(())
    }

    /// Stages AW and W offers and B readiness, from state registered at the previous edge.
    pub fn drive(&mut self, bus: &mut Bus<B>) -> Result<(), Error> {
        let aw = self.txns.iter_mut().find(|txn| !txn.aw_accepted);
        if bus.aw.stalled().map_or(false, |stalled| aw.as_ref().map(|txn| &txn.req) != Some(stalled)) {
            let _ = bus.aw.withdraw()?;
        }
        if let Some(txn) = aw {
            bus.aw.offer(txn.req)?;
            txn.aw_offered = true;
        }

        let w = self.txns.iter().find(|txn| txn.has_data_left()).map(|txn| &txn.beats[txn.sent]);
        if bus.w.stalled().map_or(false, |stalled| w != Some(stalled)) {
            let _ = bus.w.withdraw()?;
        }
        if let Some(beat) = w {
            bus.w.offer(beat.clone())?;
        }

        if !self.txns.is_empty() {
            bus.b.accept();
        }
        Ok(())
    }

    /// Consumes the B, AW and W handshakes of the last edge, in that order.
    ///
    /// An AW or W transfer of a write that the B response of the same edge tore down is dropped.
    pub fn observe(
        &mut self, fired: &Transfers<B>, tracker: &mut Tracker, events: &mut VecDeque<Event<B>>,
    ) -> Result<(), Error> {
        let aborted = match fired.b {
            Some(resp) => self.observe_response(resp, tracker, events)?,
            None => None,
        };

        if let Some(req) = fired.aw.as_ref().filter(|req| Some(req.id) != aborted) {
            let txn = some_or!(
                self.txns.iter_mut().find(|txn| !txn.aw_accepted && txn.req == *req),
                return Err(Error::UnknownId { id: req.id })
            );
            txn.aw_accepted = true;
            debug!(id = %req.id, addr = req.addr, "aw accepted");
        }

        if let Some(beat) = fired.w.as_ref().filter(|beat| Some(beat.id) != aborted) {
            let txn = some_or!(
                self.txns.iter_mut().find(|txn| txn.has_data_left()),
                return Err(Error::UnknownId { id: beat.id })
            );
            if txn.id() != beat.id {
                return Err(Error::UnknownId { id: beat.id });
            }
            let _ = tracker.advance(beat.id)?;
            txn.sent += 1;
        }
        Ok(())
    }

    /// Returns the id of the write torn down by a violation, if any.
    fn observe_response(
        &mut self, resp: WriteResp, tracker: &mut Tracker, events: &mut VecDeque<Event<B>>,
    ) -> Result<Option<Id>, Error> {
        let id = resp.id;
        let txn = some_or!(self.get(id), {
            warn!(%id, "b response with no write in flight");
            events.push_back(Event::Unexpected { id, channel: ResponseChannel::B });
            return Ok(None);
        });

        let violation = if !txn.aw_accepted {
            Some(Violation::ResponseBeforeAddress)
        } else if txn.has_data_left() {
            Some(Violation::EarlyWriteResponse { sent: txn.sent, expected: txn.beats.len() })
        } else {
            None
        };
        if let Some(violation) = violation {
            let _ = self.remove(id);
            let _ = tracker.abort(id);
            events.push_back(aborted(id, violation));
            return Ok(Some(id));
        }

        let _ = tracker.complete(id)?;
        if let Some(mut txn) = self.remove(id) {
            txn.done = true;
            debug!(%id, state = ?txn.state(), resp = ?resp.resp, "write done");
        }
        events.push_back(Event::WriteDone { id, resp: resp.resp, user: resp.user });
        Ok(None)
    }
}

fn aborted<const B: usize>(id: Id, violation: Violation) -> Event<B> {
    warn!(%id, %violation, "write aborted");
    Event::Aborted { id, error: Error::ProtocolViolation { id, violation } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Direction;
    use crate::types::{Burst, BurstLen, Resp, Size, User};

    fn id(value: u128) -> Id { Id::new(value).unwrap() }

    struct Fixture {
        path: WritePath<4>,
        tracker: Tracker,
        bus: Bus<4>,
        events: VecDeque<Event<4>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self { path: WritePath::default(), tracker: Tracker::new(16), bus: Bus::new(), events: VecDeque::new() }
        }

        fn submit(&mut self, raw: u128, addr: u32, beats: usize) {
            let req = Request::new(id(raw), addr, Size::B4, BurstLen::new(beats).unwrap(), Burst::Incr);
            let burst = req.burst_config().unwrap();
            self.tracker.register_burst(req.id, Direction::Write, &burst).unwrap();
            let data = (0..beats).map(|i| [i as u8; 4]).collect();
            self.path.push(req, &burst, data);
        }

        /// One edge with a slave that is ready on AW and W as given, and optionally responds on B.
        fn step(&mut self, aw_ready: bool, w_ready: bool, b: Option<WriteResp>) -> Transfers<4> {
            self.path.drive(&mut self.bus).unwrap();
            if aw_ready {
                self.bus.aw.accept();
            }
            if w_ready {
                self.bus.w.accept();
            }
            if let Some(resp) = b {
                self.bus.b.offer(resp).unwrap();
            }
            let fired = self.bus.commit().unwrap();
            self.path.observe(&fired, &mut self.tracker, &mut self.events).unwrap();
            fired
        }
    }

    fn okay(raw: u128) -> WriteResp { WriteResp { id: id(raw), resp: Resp::Okay, user: User::zero() } }

    #[test]
    fn beats_carry_strobes_and_last() {
        let mut f = Fixture::new();
        f.submit(5, 0x1002, 3);
        let mut beats = vec![];
        for _ in 0..3 {
            beats.push(f.step(true, true, None).w.unwrap());
        }
        assert_eq!(beats.iter().map(|b| b.strb.value()).collect::<Vec<_>>(), vec![0b1100, 0b1111, 0b1111]);
        assert_eq!(beats.iter().map(|b| b.last).collect::<Vec<_>>(), vec![false, false, true]);
        assert_eq!(f.path.state(id(5)), Some(WriteState::ResponsePending));
    }

    #[test]
    fn states_follow_handshakes() {
        let mut f = Fixture::new();
        f.submit(5, 0x1000, 2);
        assert_eq!(f.path.state(id(5)), Some(WriteState::Idle));
        f.step(false, false, None);
        assert_eq!(f.path.state(id(5)), Some(WriteState::AddressOffered));
        f.step(true, false, None);
        assert_eq!(f.path.state(id(5)), Some(WriteState::AddressAccepted));
        f.step(false, true, None);
        assert_eq!(f.path.state(id(5)), Some(WriteState::DataStreaming));
        f.step(false, true, None);
        assert_eq!(f.path.state(id(5)), Some(WriteState::ResponsePending));
        f.step(false, false, Some(okay(5)));
        assert_eq!(f.path.state(id(5)), None);
        assert!(f.tracker.is_empty());
        assert_eq!(f.events.pop_front(), Some(Event::WriteDone { id: id(5), resp: Resp::Okay, user: User::zero() }));
    }

    #[test]
    fn response_with_final_beat_is_early() {
        let mut f = Fixture::new();
        f.submit(5, 0x1000, 2);
        f.step(true, true, None);
        let fired = f.step(false, true, Some(okay(5)));
        assert!(fired.b.is_some() && fired.w.is_some());
        assert_eq!(f.events.pop_front(), Some(Event::Aborted {
            id: id(5),
            error: Error::ProtocolViolation {
                id: id(5),
                violation: Violation::EarlyWriteResponse { sent: 1, expected: 2 },
            },
        }));
        assert!(!f.tracker.contains(id(5)));
        assert!(f.path.is_empty());
    }

    #[test]
    fn response_before_address() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 1);
        f.step(false, true, None);
        f.step(false, false, Some(okay(1)));
        let violation = match f.events.pop_front() {
            Some(Event::Aborted { error: Error::ProtocolViolation { violation, .. }, .. }) => Some(violation),
            _ => None,
        };
        assert_eq!(violation, Some(Violation::ResponseBeforeAddress));
        // The stalled AW offer is withdrawn instead of being dropped.
        assert!(f.bus.aw.is_stalled());
        f.step(false, false, None);
        assert!(!f.bus.aw.is_stalled());
    }

    #[test]
    fn unexpected_response_leaves_others_alone() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 1);
        f.step(true, true, Some(okay(9)));
        assert_eq!(f.events.drain(..).collect::<Vec<_>>(), vec![Event::Unexpected {
            id: id(9),
            channel: ResponseChannel::B
        }]);
        assert_eq!(f.path.state(id(1)), Some(WriteState::ResponsePending));
    }

    #[test]
    fn data_does_not_interleave() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 2);
        f.submit(2, 0x100, 2);
        let ids = (0..4).map(|_| f.step(true, true, None).w.unwrap().id).collect::<Vec<_>>();
        assert_eq!(ids, vec![id(1), id(1), id(2), id(2)]);
    }

    #[test]
    fn cancel_only_before_handshakes() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 2);
        f.step(false, false, None);
        f.path.cancel(id(1)).unwrap();
        assert!(f.path.is_empty());
        // Both stalled offers are withdrawn on the next edge.
        f.step(true, true, None);
        assert!(!f.bus.aw.is_stalled() && !f.bus.w.is_stalled());

        f.submit(2, 0x0, 2);
        f.step(true, false, None);
        assert_eq!(f.path.cancel(id(2)), Err(Error::CancelRejected { id: id(2) }));
        assert_eq!(f.path.cancel(id(3)), Err(Error::UnknownId { id: id(3) }));
    }
}
