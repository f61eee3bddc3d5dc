//! Outstanding-transaction tracker.
//!
//! Keeps one entry per in-flight transaction id, in issue order. Every response beat is checked
//! against its entry: a beat for an id that is not tracked, or beyond the burst length, is never
//! legitimate.

use std::fmt;

use busflow::some_or;
use linked_hash_map::LinkedHashMap;
use tracing::trace;

use crate::burst::BurstConfig;
use crate::error::Error;
use crate::types::{Id, MAX_BURST_LEN, MAX_IDS};

/// Transfer direction.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => write!(f, "read"),
            Direction::Write => write!(f, "write"),
        }
    }
}

/// Outstanding entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    id: Id,
    direction: Direction,
    expected: usize,
    completed: usize,
    burst: Option<BurstConfig>,
}

impl Entry {
    /// Transaction id.
    pub fn id(&self) -> Id { self.id }

    /// Transfer direction.
    pub fn direction(&self) -> Direction { self.direction }

    /// Beats in the burst.
    pub fn expected(&self) -> usize { self.expected }

    /// Beats completed so far.
    pub fn completed(&self) -> usize { self.completed }

    /// Whether every beat has completed.
    pub fn is_complete(&self) -> bool { self.completed == self.expected }

    /// Address of the next expected beat, if the burst is known.
    pub fn next_addr(&self) -> Option<u32> {
        let burst = self.burst.as_ref()?;
        (self.completed < self.expected).then(|| burst.addr_of(self.completed))
    }
}

/// A beat accepted by [`Tracker::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    /// Index within the burst, from 0.
    pub index: usize,
    /// Beat address, if the burst is known.
    pub addr: Option<u32>,
    /// Whether this is the final beat.
    pub last: bool,
}

/// Outstanding-transaction tracker.
#[derive(Debug, Clone)]
pub struct Tracker {
    entries: LinkedHashMap<Id, Entry>,
    capacity: usize,
}

impl Tracker {
    /// Creates a tracker holding at most `capacity` transactions (clamped to the id space).
    pub fn new(capacity: usize) -> Self { Self { entries: LinkedHashMap::new(), capacity: capacity.min(MAX_IDS) } }

    /// Maximum number of outstanding transactions.
    pub fn capacity(&self) -> usize { self.capacity }

    /// Number of outstanding transactions.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Whether `id` is outstanding.
    pub fn contains(&self, id: Id) -> bool { self.entries.contains_key(&id) }

    /// Entry of `id`.
    pub fn get(&self, id: Id) -> Option<&Entry> { self.entries.get(&id) }

    /// Outstanding entries in issue order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ { self.entries.values() }

    /// Lowest id that is not outstanding.
    pub fn free_id(&self) -> Option<Id> {
        (0..MAX_IDS as u128).map(Id::truncate).find(|id| !self.entries.contains_key(id))
    }

    /// Starts tracking a transaction of `beats` beats.
    pub fn register(&mut self, id: Id, direction: Direction, beats: usize) -> Result<(), Error> {
        self.insert(Entry { id, direction, expected: beats, completed: 0, burst: None })
    }

    /// Starts tracking a transaction and the address sequence of its burst.
    pub fn register_burst(&mut self, id: Id, direction: Direction, burst: &BurstConfig) -> Result<(), Error> {
        self.insert(Entry { id, direction, expected: burst.beats(), completed: 0, burst: Some(*burst) })
    }

    fn insert(&mut self, entry: Entry) -> Result<(), Error> {
        if !(1..=MAX_BURST_LEN).contains(&entry.expected) {
            return Err(Error::InvalidBurstConfig { reason: "burst length must be in 1..=16" });
        }
        if self.entries.contains_key(&entry.id) {
            return Err(Error::IdInUse { id: entry.id });
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::TrackerFull { capacity: self.capacity });
        }
        trace!(id = %entry.id, direction = %entry.direction, beats = entry.expected, "register");
        let _ = self.entries.insert(entry.id, entry);
        Ok(())
    }

    /// Counts one more completed beat of `id`.
    pub fn advance(&mut self, id: Id) -> Result<Beat, Error> {
        let entry = some_or!(self.entries.get_mut(&id), return Err(Error::UnknownId { id }));
        if entry.completed >= entry.expected {
            return Err(Error::BeatOverrun { id, expected: entry.expected });
        }
        let last = entry.completed + 1 == entry.expected;
        let beat = Beat { index: entry.completed, addr: entry.next_addr(), last };
        entry.completed += 1;
        Ok(beat)
    }

    /// Stops tracking a transaction whose beats have all completed.
    pub fn complete(&mut self, id: Id) -> Result<Entry, Error> {
        let entry = some_or!(self.entries.get(&id), return Err(Error::UnknownId { id }));
        if !entry.is_complete() {
            return Err(Error::Incomplete { id, completed: entry.completed, expected: entry.expected });
        }
        trace!(%id, "complete");
        self.entries.remove(&id).ok_or(Error::UnknownId { id })
    }

    /// Stops tracking a transaction regardless of progress.
    pub fn abort(&mut self, id: Id) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        trace!(%id, completed = entry.completed, expected = entry.expected, "abort");
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::types::{Burst, BurstLen, Size};

    fn id(value: u128) -> Id { Id::new(value).unwrap() }

    #[test]
    fn register_rejects_duplicate_ids() {
        let mut tracker = Tracker::new(16);
        tracker.register(id(5), Direction::Write, 4).unwrap();
        assert_eq!(tracker.register(id(5), Direction::Read, 1), Err(Error::IdInUse { id: id(5) }));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(id(5)).unwrap().direction(), Direction::Write);
    }

    #[test]
    fn advance_and_complete() {
        let mut tracker = Tracker::new(16);
        tracker.register(id(1), Direction::Read, 2).unwrap();
        assert_eq!(tracker.complete(id(1)), Err(Error::Incomplete { id: id(1), completed: 0, expected: 2 }));
        assert_eq!(tracker.advance(id(1)).unwrap(), Beat { index: 0, addr: None, last: false });
        assert_eq!(tracker.advance(id(1)).unwrap(), Beat { index: 1, addr: None, last: true });
        assert_eq!(tracker.advance(id(1)), Err(Error::BeatOverrun { id: id(1), expected: 2 }));
        let entry = tracker.complete(id(1)).unwrap();
        assert!(entry.is_complete());
        assert!(tracker.is_empty());
    }

    #[test]
    fn unknown_ids() {
        let mut tracker = Tracker::new(16);
        assert_eq!(tracker.advance(id(9)), Err(Error::UnknownId { id: id(9) }));
        assert_eq!(tracker.complete(id(9)), Err(Error::UnknownId { id: id(9) }));
        assert_eq!(tracker.abort(id(9)), None);
    }

    #[test]
    fn burst_entries_track_next_address() {
        let mut tracker = Tracker::new(16);
        let burst = BurstConfig::new(0x2000, Size::B8, BurstLen::new(2).unwrap(), Burst::Wrap).unwrap();
        tracker.register_burst(id(7), Direction::Read, &burst).unwrap();
        assert_eq!(tracker.get(id(7)).unwrap().next_addr(), Some(0x2000));
        assert_eq!(tracker.advance(id(7)).unwrap().addr, Some(0x2000));
        assert_eq!(tracker.advance(id(7)).unwrap().addr, Some(0x2008));
        assert_eq!(tracker.get(id(7)).unwrap().next_addr(), None);
    }

    #[test]
    fn capacity_and_free_ids() {
        let mut tracker = Tracker::new(2);
        assert_eq!(tracker.free_id(), Some(id(0)));
        tracker.register(id(0), Direction::Read, 1).unwrap();
        assert_eq!(tracker.free_id(), Some(id(1)));
        tracker.register(id(3), Direction::Read, 1).unwrap();
        assert_eq!(tracker.register(id(1), Direction::Read, 1), Err(Error::TrackerFull { capacity: 2 }));
        assert_eq!(tracker.iter().map(Entry::id).collect::<Vec<_>>(), vec![id(0), id(3)]);
        assert!(tracker.abort(id(0)).is_some());
        assert_eq!(tracker.free_id(), Some(id(0)));
    }

    #[test]
    fn rejects_out_of_range_beat_counts() {
        let mut tracker = Tracker::new(4);
        assert!(matches!(tracker.register(id(0), Direction::Write, 0), Err(Error::InvalidBurstConfig { .. })));
        assert!(matches!(tracker.register(id(0), Direction::Write, 17), Err(Error::InvalidBurstConfig { .. })));
    }

    proptest! {
        #[test]
        fn full_round_trip_frees_the_id(raw in 0u128..4096, beats in 1usize..=16) {
            let mut tracker = Tracker::new(MAX_IDS);
            let id = Id::new(raw).unwrap();
            tracker.register(id, Direction::Write, beats).unwrap();
            for index in 0..beats {
                let beat = tracker.advance(id).unwrap();
                prop_assert_eq!(beat.index, index);
                prop_assert_eq!(beat.last, index + 1 == beats);
            }
            tracker.complete(id).unwrap();
            prop_assert!(!tracker.contains(id));
            prop_assert!(tracker.register(id, Direction::Read, beats).is_ok());
        }
    }
}
