//! Master adapter: the request API on one side, the five AXI4 channels on the other.

use std::collections::VecDeque;

use busflow::some_or;
use tracing::{debug, trace};

use crate::burst::BurstConfig;
use crate::bus::{Bus, Responder, Transfers};
use crate::config::MasterConfig;
use crate::error::Error;
use crate::event::{Event, Stats};
use crate::read::{ReadPath, ReadState};
use crate::tracker::{Direction, Tracker};
use crate::types::{Id, Lock, Request, DATA_BYTES};
use crate::write::{WritePath, WriteState};

/// State of an outstanding transaction.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnState {
    Write(WriteState),
    Read(ReadState),
}

/// AXI4 master adapter on a `B`-byte data bus.
///
/// Requests are validated and registered with the tracker at submission, so an id is taken from
/// the moment [`submit_write`](Self::submit_write) or [`submit_read`](Self::submit_read) returns
/// until its [`Event::WriteDone`], [`Event::ReadDone`] or [`Event::Aborted`]. Reads and writes share
/// one id space.
#[derive(Debug, Clone)]
pub struct MasterAdapter<const B: usize = DATA_BYTES> {
    config: MasterConfig,
    tracker: Tracker,
    write: WritePath<B>,
    read: ReadPath,
    events: VecDeque<Event<B>>,
    stats: Stats,
}

impl<const B: usize> MasterAdapter<B> {
    /// Creates an idle adapter.
    pub fn new(config: MasterConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            tracker: Tracker::new(config.max_outstanding),
            write: WritePath::default(),
            read: ReadPath::default(),
            events: VecDeque::new(),
            stats: Stats::default(),
        })
    }

    /// Configuration.
    pub fn config(&self) -> &MasterConfig { &self.config }

    /// Counters.
    pub fn stats(&self) -> &Stats { &self.stats }

    /// Lowest id not in use.
    pub fn alloc_id(&self) -> Result<Id, Error> { self.tracker.free_id().ok_or(Error::NoFreeId) }

    fn validate(&self, req: &Request) -> Result<BurstConfig, Error> {
        if req.size.bytes() as usize > B {
            return Err(Error::InvalidBurstConfig { reason: "transfer size exceeds the data bus width" });
        }
        if req.side.lock == Lock::Locked {
            return Err(Error::InvalidBurstConfig { reason: "locked access is not part of AXI4" });
        }
        let burst = req.burst_config()?;
        if self.config.check_4k_boundary && burst.crosses_boundary() {
            return Err(Error::InvalidBurstConfig { reason: "incrementing burst crosses a 4 KiB boundary" });
        }
        Ok(burst)
    }

    /// Submits a write with one data entry per beat, byte lane 0 first.
    ///
    /// Strobes are derived from the beat addresses. Nothing changes if the request is rejected.
    pub fn submit_write(&mut self, req: Request, data: Vec<[u8; B]>) -> Result<Id, Error> {
        let burst = self.validate(&req)?;
        if data.len() != burst.beats() {
            return Err(Error::InvalidBurstConfig { reason: "number of data beats must match the burst length" });
        }
        self.tracker.register_burst(req.id, Direction::Write, &burst)?;
        self.write.push(req, &burst, data);
        self.stats.writes_submitted += 1;
        debug!(id = %req.id, addr = req.addr, beats = burst.beats(), "write submitted");
        Ok(req.id)
    }

    /// Submits a read. Nothing changes if the request is rejected.
    pub fn submit_read(&mut self, req: Request) -> Result<Id, Error> {
        let burst = self.validate(&req)?;
        self.tracker.register_burst(req.id, Direction::Read, &burst)?;
        self.read.push(req);
        self.stats.reads_submitted += 1;
        debug!(id = %req.id, addr = req.addr, beats = burst.beats(), "read submitted");
        Ok(req.id)
    }

    /// Cancels a transaction whose address was not accepted yet (for a write, with no data beat
    /// accepted either) and frees its id.
    pub fn cancel(&mut self, id: Id) -> Result<(), Error> {
        let entry = some_or!(self.tracker.get(id), return Err(Error::UnknownId { id }));
        match entry.direction() {
            Direction::Write => self.write.cancel(id)?,
            Direction::Read => self.read.cancel(id)?,
        }
        let _ = self.tracker.abort(id);
        self.stats.cancelled += 1;
        Ok(())
    }

    /// State of transaction `id`, if it is outstanding.
    pub fn state(&self, id: Id) -> Option<TxnState> {
        match self.tracker.get(id)?.direction() {
            Direction::Write => self.write.state(id).map(TxnState::Write),
            Direction::Read => self.read.state(id).map(TxnState::Read),
        }
    }

    /// Outstanding transactions in submission order.
    pub fn outstanding(&self) -> Vec<(Id, TxnState)> {
        self.tracker.iter().filter_map(|entry| Some((entry.id(), self.state(entry.id())?))).collect()
    }

    /// Whether no transaction is outstanding.
    pub fn is_idle(&self) -> bool { self.tracker.is_empty() }

    /// Takes the oldest pending event.
    pub fn poll_event(&mut self) -> Option<Event<B>> { self.events.pop_front() }

    /// Takes all pending events, oldest first.
    pub fn events(&mut self) -> impl Iterator<Item = Event<B>> + '_ { self.events.drain(..) }

    /// Stages this step's signals. Depends only on state registered at earlier edges.
    pub fn drive(&mut self, bus: &mut Bus<B>) -> Result<(), Error> {
        self.write.drive(bus)?;
        self.read.drive(bus)
    }

    /// Consumes the handshakes of the edge just committed.
    ///
    /// Protocol violations become [`Event::Aborted`]; an `Err` means the adapter's own bookkeeping
    /// is inconsistent.
    pub fn observe(&mut self, fired: &Transfers<B>) -> Result<(), Error> {
        self.stats.record_transfers(fired);
        let before = self.events.len();
        self.write.observe(fired, &mut self.tracker, &mut self.events)?;
        self.read.observe(fired, &mut self.tracker, &mut self.events)?;
        for event in self.events.range(before..) {
            self.stats.record_event(event);
            trace!(?event, "event");
        }
        Ok(())
    }
}

/// Runs one clock step: both sides drive, the bus commits, both sides observe.
pub fn step<const B: usize, R: Responder<B> + ?Sized>(
    master: &mut MasterAdapter<B>, responder: &mut R, bus: &mut Bus<B>,
) -> Result<Transfers<B>, Error> {
    master.drive(bus)?;
    responder.drive(bus)?;
    let fired = bus.commit()?;
    responder.observe(&fired);
    master.observe(&fired)?;
    Ok(fired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Violation;
    use crate::types::{Burst, BurstLen, Resp, Sideband, Size, User, WriteResp};

    fn id(value: u128) -> Id { Id::new(value).unwrap() }

    fn request(raw: u128, addr: u32, size: Size, beats: usize, burst: Burst) -> Request {
        Request::new(id(raw), addr, size, BurstLen::new(beats).unwrap(), burst)
    }

    /// Accepts every address and data beat, and answers each write one edge after its last beat.
    #[derive(Default)]
    struct Sink {
        pending: Option<WriteResp>,
    }

    impl Responder<4> for Sink {
        fn drive(&mut self, bus: &mut Bus<4>) -> Result<(), Error> {
            bus.aw.accept();
            bus.w.accept();
            if let Some(resp) = self.pending {
                bus.b.offer(resp)?;
            }
            Ok(())
        }

        fn observe(&mut self, fired: &Transfers<4>) {
            if fired.b.is_some() {
                self.pending = None;
            }
            if let Some(beat) = fired.w.as_ref().filter(|beat| beat.last) {
                self.pending = Some(WriteResp { id: beat.id, resp: Resp::Okay, user: User::zero() });
            }
        }
    }

    #[test]
    fn write_scenario() {
        let mut master = MasterAdapter::<4>::new(MasterConfig::default()).unwrap();
        let mut sink = Sink::default();
        let mut bus = Bus::new();
        let req = request(5, 0x1000, Size::B4, 4, Burst::Incr);
        assert_eq!(master.submit_write(req, vec![[1; 4], [2; 4], [3; 4], [4; 4]]), Ok(id(5)));

        let mut steps = 0;
        while !master.is_idle() {
            let fired = step(&mut master, &mut sink, &mut bus).unwrap();
            if fired.w.is_some() && master.state(id(5)) == Some(TxnState::Write(WriteState::DataStreaming)) {
                // A second request with the same id is refused mid-burst.
                let again = request(5, 0, Size::B4, 1, Burst::Incr);
                assert_eq!(master.submit_read(again), Err(Error::IdInUse { id: id(5) }));
            }
            steps += 1;
            assert!(steps < 10);
        }

        let events = master.events().collect::<Vec<_>>();
        assert_eq!(events, vec![Event::WriteDone { id: id(5), resp: Resp::Okay, user: User::zero() }]);
        let stats = master.stats();
        assert_eq!((stats.writes_submitted, stats.writes_done, stats.aw_transfers, stats.w_transfers), (1, 1, 1, 4));
        assert_eq!(stats.b_transfers, 1);
    }

    #[test]
    fn rejected_requests_change_nothing() {
        let mut master = MasterAdapter::<4>::new(MasterConfig::default()).unwrap();
        assert!(matches!(
            master.submit_read(request(1, 0, Size::B8, 1, Burst::Incr)),
            Err(Error::InvalidBurstConfig { .. })
        ));
        assert!(matches!(
            master.submit_read(request(1, 0xff8, Size::B4, 4, Burst::Incr)),
            Err(Error::InvalidBurstConfig { .. })
        ));
        assert!(matches!(
            master.submit_read(request(1, 0x2004, Size::B4, 3, Burst::Wrap)),
            Err(Error::InvalidBurstConfig { .. })
        ));
        assert!(matches!(
            master.submit_write(request(1, 0, Size::B4, 2, Burst::Incr), vec![[0; 4]]),
            Err(Error::InvalidBurstConfig { .. })
        ));
        let locked = Sideband { lock: Lock::Locked, ..Sideband::default() };
        assert!(matches!(
            master.submit_read(request(1, 0, Size::B4, 1, Burst::Incr).with_sideband(locked)),
            Err(Error::InvalidBurstConfig { .. })
        ));
        assert!(master.is_idle());
        assert_eq!(master.stats(), &Stats::default());

        let relaxed = MasterConfig { check_4k_boundary: false, ..MasterConfig::default() };
        let mut master = MasterAdapter::<4>::new(relaxed).unwrap();
        assert!(master.submit_read(request(1, 0xff8, Size::B4, 4, Burst::Incr)).is_ok());
        let exclusive = Sideband { lock: Lock::Exclusive, ..Sideband::default() };
        assert!(master.submit_read(request(2, 0x0, Size::B4, 1, Burst::Incr).with_sideband(exclusive)).is_ok());
    }

    #[test]
    fn capacity_and_id_allocation() {
        let config = MasterConfig { max_outstanding: 2, ..MasterConfig::default() };
        let mut master = MasterAdapter::<4>::new(config).unwrap();
        let first = master.alloc_id().unwrap();
        master.submit_read(Request::new(first, 0, Size::B4, BurstLen::ONE, Burst::Incr)).unwrap();
        let second = master.alloc_id().unwrap();
        assert_ne!(first, second);
        master.submit_write(Request::new(second, 0, Size::B4, BurstLen::ONE, Burst::Incr), vec![[0; 4]]).unwrap();
        assert_eq!(
            master.submit_read(request(9, 0, Size::B4, 1, Burst::Incr)),
            Err(Error::TrackerFull { capacity: 2 })
        );
        assert_eq!(master.outstanding(), vec![
            (first, TxnState::Read(ReadState::Idle)),
            (second, TxnState::Write(WriteState::Idle))
        ]);
    }

    #[test]
    fn cancel_before_and_after_address() {
        let mut master = MasterAdapter::<4>::new(MasterConfig::default()).unwrap();
        let mut bus = Bus::new();
        master.submit_read(request(1, 0, Size::B4, 1, Burst::Incr)).unwrap();
        master.drive(&mut bus).unwrap();
        master.observe(&bus.commit().unwrap()).unwrap();
        assert_eq!(master.state(id(1)), Some(TxnState::Read(ReadState::AddressOffered)));
        master.cancel(id(1)).unwrap();
        assert!(master.is_idle());
        assert_eq!(master.cancel(id(1)), Err(Error::UnknownId { id: id(1) }));

        master.submit_write(request(2, 0, Size::B4, 1, Burst::Incr), vec![[0; 4]]).unwrap();
        master.drive(&mut bus).unwrap();
        bus.aw.accept();
        master.observe(&bus.commit().unwrap()).unwrap();
        assert_eq!(master.cancel(id(2)), Err(Error::CancelRejected { id: id(2) }));
        assert_eq!(master.stats().cancelled, 1);
    }

    #[test]
    fn violation_frees_the_id() {
        let mut master = MasterAdapter::<4>::new(MasterConfig::default()).unwrap();
        let mut bus = Bus::new();
        master.submit_write(request(5, 0x1000, Size::B4, 2, Burst::Incr), vec![[0; 4]; 2]).unwrap();
        master.drive(&mut bus).unwrap();
        bus.aw.accept();
        bus.w.accept();
        bus.b.offer(WriteResp { id: id(5), resp: Resp::Okay, user: User::zero() }).unwrap();
        master.observe(&bus.commit().unwrap()).unwrap();

        assert_eq!(master.poll_event(), Some(Event::Aborted {
            id: id(5),
            error: Error::ProtocolViolation { id: id(5), violation: Violation::ResponseBeforeAddress },
        }));
        assert!(master.is_idle());
        assert_eq!(master.stats().aborted, 1);
        assert!(master.submit_write(request(5, 0x1000, Size::B4, 1, Burst::Incr), vec![[0; 4]]).is_ok());
    }
}
