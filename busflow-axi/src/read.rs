//! Read path: the AR handshake and the R beat stream.

use std::collections::VecDeque;

use busflow::some_or;
use tracing::{debug, warn};

use crate::bus::{Bus, Transfers};
use crate::error::{Error, Violation};
use crate::event::{Event, ReadBeat, ResponseChannel};
use crate::tracker::Tracker;
use crate::types::{Id, ReadData, Request};

/// State of one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadState {
    /// Waiting for the AR channel.
    Idle,
    /// The request is on the AR channel.
    AddressOffered,
    /// AR accepted, no beat received yet.
    AddressAccepted,
    /// Some beats received.
    DataStreaming,
    /// The final beat was received.
    Done,
}

#[derive(Debug, Clone)]
struct ReadTxn {
    req: Request,
    offered: bool,
    accepted: bool,
    received: usize,
}

impl ReadTxn {
    fn state(&self) -> ReadState {
        match (self.offered, self.accepted, self.received) {
            (_, true, 0) => ReadState::AddressAccepted,
            (_, true, received) if received < self.req.len.beats() => ReadState::DataStreaming,
            (_, true, _) => ReadState::Done,
            (true, false, _) => ReadState::AddressOffered,
            (false, false, _) => ReadState::Idle,
        }
    }
}

/// Read path controller.
///
/// AR requests go out in submission order. Beats of different reads may interleave; the beats of
/// one read must arrive in order with `last` on the final one only.
#[derive(Debug, Clone, Default)]
pub struct ReadPath {
    txns: VecDeque<ReadTxn>,
}

impl ReadPath {
    /// Queues a read that the tracker already registered.
    pub fn push(&mut self, req: Request) {
        self.txns.push_back(ReadTxn { req, offered: false, accepted: false, received: 0 });
    }

    /// Number of reads in flight.
    pub fn len(&self) -> usize { self.txns.len() }

    /// Whether no read is in flight.
    pub fn is_empty(&self) -> bool { self.txns.is_empty() }

    /// State of the read with this id.
    pub fn state(&self, id: Id) -> Option<ReadState> { self.get(id).map(ReadTxn::state) }

    fn get(&self, id: Id) -> Option<&ReadTxn> { self.txns.iter().find(|txn| txn.req.id == id) }

    fn remove(&mut self, id: Id) -> Option<ReadTxn> {
        let index = self.txns.iter().position(|txn| txn.req.id == id)?;
        self.txns.remove(index)
    }

    /// Drops a read whose address was not accepted. A stalled AR offer is withdrawn on the next
    /// drive.
    pub fn cancel(&mut self, id: Id) -> Result<(), Error> {
        let txn = some_or!(self.get(id), return Err(Error::UnknownId { id }));
        if txn.accepted {
            return Err(Error::CancelRejected { id });
        }
        let _ = self.remove(id);
        debug!(%id, "read cancelled");
        Ok(())
    }

    /// Stages the AR offer and R readiness.
    ///
    /// R is ready while some read had its address accepted at an earlier edge.
    pub fn drive<const B: usize>(&mut self, bus: &mut Bus<B>) -> Result<(), Error> {
        let ar = self.txns.iter_mut().find(|txn| !txn.accepted);
        if bus.ar.stalled().map_or(false, |stalled| ar.as_ref().map(|txn| &txn.req) != Some(stalled)) {
            let _ = bus.ar.withdraw()?;
        }
        if let Some(txn) = ar {
            bus.ar.offer(txn.req)?;
            txn.offered = true;
        }

        if self.txns.iter().any(|txn| txn.accepted) {
            bus.r.accept();
        }
        Ok(())
    }

    /// Consumes the R and AR handshakes of the last edge, in that order.
    pub fn observe<const B: usize>(
        &mut self, fired: &Transfers<B>, tracker: &mut Tracker, events: &mut VecDeque<Event<B>>,
    ) -> Result<(), Error> {
        let aborted = match &fired.r {
            Some(beat) => self.observe_beat(beat, tracker, events)?,
            None => None,
        };

        if let Some(req) = fired.ar.as_ref().filter(|req| Some(req.id) != aborted) {
            let txn = some_or!(
                self.txns.iter_mut().find(|txn| !txn.accepted && txn.req == *req),
                return Err(Error::UnknownId { id: req.id })
            );
            txn.accepted = true;
            debug!(id = %req.id, addr = req.addr, beats = req.len.beats(), "ar accepted");
        }
        Ok(())
    }

    /// Returns the id of the read torn down by a violation, if any.
    fn observe_beat<const B: usize>(
        &mut self, data: &ReadData<B>, tracker: &mut Tracker, events: &mut VecDeque<Event<B>>,
    ) -> Result<Option<Id>, Error> {
        let id = data.id;
        let txn = some_or!(self.get(id), {
            warn!(%id, "r beat with no read in flight");
            events.push_back(Event::Unexpected { id, channel: ResponseChannel::R });
            return Ok(None);
        });
        if !txn.accepted {
            self.abort(id, tracker, events, Violation::ResponseBeforeAddress);
            return Ok(Some(id));
        }

        let beat = tracker.advance(id)?;
        let expected = txn.req.len.beats();
        match (data.last, beat.last) {
            (true, false) => {
                self.abort(id, tracker, events, Violation::PrematureLast { beat: beat.index + 1, expected });
                return Ok(Some(id));
            }
            (false, true) => {
                self.abort(id, tracker, events, Violation::MissingLast { expected });
                return Ok(Some(id));
            }
            _ => {}
        }

        let txn = some_or!(self.txns.iter_mut().find(|txn| txn.req.id == id), return Err(Error::UnknownId { id }));
        txn.received += 1;
        events.push_back(Event::ReadBeat(ReadBeat {
            id,
            index: beat.index,
            addr: beat.addr.unwrap_or(txn.req.addr),
            data: data.data,
            resp: data.resp,
            user: data.user,
            last: data.last,
        }));

        if beat.last {
            let entry = tracker.complete(id)?;
            if let Some(txn) = self.remove(id) {
                debug!(%id, state = ?txn.state(), "read done");
            }
            events.push_back(Event::ReadDone { id, beats: entry.expected() });
        }
        Ok(None)
    }

    fn abort<const B: usize>(
        &mut self, id: Id, tracker: &mut Tracker, events: &mut VecDeque<Event<B>>, violation: Violation,
    ) {
        let _ = self.remove(id);
        let _ = tracker.abort(id);
        events.push_back(aborted(id, violation));
    }
}

fn aborted<const B: usize>(id: Id, violation: Violation) -> Event<B> {
    warn!(%id, %violation, "read aborted");
    Event::Aborted { id, error: Error::ProtocolViolation { id, violation } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Direction;
    use crate::types::{Burst, BurstLen, Resp, Size, User};

    fn id(value: u128) -> Id { Id::new(value).unwrap() }

    struct Fixture {
        path: ReadPath,
        tracker: Tracker,
        bus: Bus<8>,
        events: VecDeque<Event<8>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self { path: ReadPath::default(), tracker: Tracker::new(16), bus: Bus::new(), events: VecDeque::new() }
        }

        fn submit(&mut self, raw: u128, addr: u32, beats: usize, burst: Burst) {
            let req = Request::new(id(raw), addr, Size::B8, BurstLen::new(beats).unwrap(), burst);
            self.tracker.register_burst(req.id, Direction::Read, &req.burst_config().unwrap()).unwrap();
            self.path.push(req);
        }

        fn step(&mut self, ar_ready: bool, r: Option<ReadData<8>>) -> Transfers<8> {
            self.path.drive(&mut self.bus).unwrap();
            if ar_ready {
                self.bus.ar.accept();
            }
            if let Some(beat) = r {
                self.bus.r.offer(beat).unwrap();
            }
            let fired = self.bus.commit().unwrap();
            self.path.observe(&fired, &mut self.tracker, &mut self.events).unwrap();
            fired
        }
    }

    fn beat(raw: u128, fill: u8, last: bool) -> ReadData<8> {
        ReadData { id: id(raw), data: [fill; 8], resp: Resp::Okay, last, user: User::zero() }
    }

    fn violation(event: Option<Event<8>>) -> Option<Violation> {
        match event {
            Some(Event::Aborted { error: Error::ProtocolViolation { violation, .. }, .. }) => Some(violation),
            _ => None,
        }
    }

    #[test]
    fn wrap_read_delivers_beats_in_address_order() {
        let mut f = Fixture::new();
        f.submit(7, 0x2000, 2, Burst::Wrap);
        assert_eq!(f.path.state(id(7)), Some(ReadState::Idle));
        f.step(true, None);
        assert_eq!(f.path.state(id(7)), Some(ReadState::AddressAccepted));
        f.step(false, Some(beat(7, 0xa, false)));
        assert_eq!(f.path.state(id(7)), Some(ReadState::DataStreaming));
        f.step(false, Some(beat(7, 0xb, true)));
        assert_eq!(f.path.state(id(7)), None);

        let events = f.events.drain(..).collect::<Vec<_>>();
        assert_eq!(events.len(), 3);
        match (&events[0], &events[1]) {
            (Event::ReadBeat(first), Event::ReadBeat(second)) => {
                assert_eq!((first.index, first.addr, first.data, first.last), (0, 0x2000, [0xa; 8], false));
                assert_eq!((second.index, second.addr, second.data, second.last), (1, 0x2008, [0xb; 8], true));
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(events[2], Event::ReadDone { id: id(7), beats: 2 });
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn not_ready_before_address_accepted() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 1, Burst::Incr);
        let fired = f.step(false, Some(beat(1, 0, true)));
        assert!(fired.r.is_none());
        assert_eq!(f.path.state(id(1)), Some(ReadState::AddressOffered));
        assert!(f.events.is_empty());
    }

    #[test]
    fn same_edge_response_is_before_address() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 1, Burst::Incr);
        f.submit(2, 0x100, 1, Burst::Incr);
        f.step(true, None);
        // Read 2 is on AR; its data arrives on the edge that accepts the address.
        let fired = f.step(true, Some(beat(2, 0, true)));
        assert!(fired.ar.is_some() && fired.r.is_some());
        assert_eq!(violation(f.events.pop_front()), Some(Violation::ResponseBeforeAddress));
        assert_eq!(f.path.state(id(2)), None);
        assert_eq!(f.path.state(id(1)), Some(ReadState::AddressAccepted));
    }

    #[test]
    fn premature_last() {
        let mut f = Fixture::new();
        f.submit(3, 0x0, 4, Burst::Incr);
        f.step(true, None);
        f.step(false, Some(beat(3, 0, false)));
        f.step(false, Some(beat(3, 0, true)));
        let _ = f.events.pop_front();
        assert_eq!(violation(f.events.pop_front()), Some(Violation::PrematureLast { beat: 2, expected: 4 }));
        assert!(!f.tracker.contains(id(3)));
    }

    #[test]
    fn missing_last() {
        let mut f = Fixture::new();
        f.submit(3, 0x0, 1, Burst::Incr);
        f.step(true, None);
        f.step(false, Some(beat(3, 0, false)));
        assert_eq!(violation(f.events.pop_front()), Some(Violation::MissingLast { expected: 1 }));
        assert!(f.path.is_empty());
    }

    #[test]
    fn interleaved_ids() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 2, Burst::Incr);
        f.submit(2, 0x100, 2, Burst::Incr);
        f.step(true, None);
        f.step(true, None);
        for (raw, last) in [(1, false), (2, false), (2, true), (1, true)] {
            f.step(false, Some(beat(raw, raw as u8, last)));
        }
        let done = f
            .events
            .iter()
            .filter_map(|event| match event {
                Event::ReadDone { id, .. } => Some(*id),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(done, vec![id(2), id(1)]);
        assert!(f.path.is_empty());
    }

    #[test]
    fn beat_for_an_untracked_id_is_unexpected() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 1, Burst::Incr);
        f.step(true, None);
        f.step(false, Some(beat(9, 0, true)));
        assert_eq!(f.events.drain(..).collect::<Vec<_>>(), vec![Event::Unexpected {
            id: id(9),
            channel: ResponseChannel::R
        }]);
        assert_eq!(f.path.state(id(1)), Some(ReadState::AddressAccepted));
        assert!(f.tracker.contains(id(1)));
    }

    #[test]
    fn error_status_passes_through() {
        let mut f = Fixture::new();
        f.submit(4, 0x0, 1, Burst::Incr);
        f.step(true, None);
        f.step(false, Some(ReadData { resp: Resp::SlvErr, ..beat(4, 0, true) }));
        assert!(matches!(f.events.pop_front(), Some(Event::ReadBeat(ReadBeat { resp: Resp::SlvErr, .. }))));
        assert_eq!(f.events.pop_front(), Some(Event::ReadDone { id: id(4), beats: 1 }));
    }

    #[test]
    fn cancel() {
        let mut f = Fixture::new();
        f.submit(1, 0x0, 1, Burst::Incr);
        f.step(false, None);
        f.path.cancel(id(1)).unwrap();
        f.step(false, None);
        assert!(!f.bus.ar.is_stalled());

        f.submit(2, 0x0, 1, Burst::Incr);
        f.step(true, None);
        assert_eq!(f.path.cancel(id(2)), Err(Error::CancelRejected { id: id(2) }));
    }
}
