//! Testbench: a master adapter and a slave on one bus, stepped together.

use std::collections::HashMap;

use busflow_axi::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BenchConfig, Op, OpKind, Scenario};
use crate::memory::MemoryResponder;
use crate::trace::WireTrace;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Axi(#[from] Error),

    #[error("not idle after {steps} steps, {outstanding} transactions outstanding")]
    Timeout { steps: u64, outstanding: usize },

    #[error("invalid op: {reason}")]
    InvalidOp { reason: &'static str },
}

/// Master adapter, slave and bus.
#[derive(Debug)]
pub struct Testbench<R, const B: usize = DATA_BYTES> {
    /// The master under test.
    pub master: MasterAdapter<B>,
    /// The slave.
    pub responder: R,
    bus: Bus<B>,
    cycle: u64,
    trace: Option<WireTrace>,
}

impl<R: Responder<B>, const B: usize> Testbench<R, B> {
    /// Connects `master` and `responder`.
    pub fn new(master: MasterAdapter<B>, responder: R) -> Self {
        Self { master, responder, bus: Bus::new(), cycle: 0, trace: None }
    }

    /// Records every handshake from now on.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(WireTrace::new());
        self
    }

    /// Steps taken so far.
    pub fn cycle(&self) -> u64 { self.cycle }

    /// The recorded trace, if enabled.
    pub fn trace(&self) -> Option<&WireTrace> { self.trace.as_ref() }

    /// Advances one step.
    pub fn tick(&mut self) -> Result<Transfers<B>, BenchError> {
        let fired = step(&mut self.master, &mut self.responder, &mut self.bus)?;
        if let Some(trace) = &mut self.trace {
            trace.record(self.cycle, &fired);
        }
        self.cycle += 1;
        Ok(fired)
    }

    /// Steps until the master has nothing outstanding. Returns the number of steps taken.
    pub fn run_until_idle(&mut self, max_steps: u64) -> Result<u64, BenchError> {
        let start = self.cycle;
        while !self.master.is_idle() {
            if self.cycle - start >= max_steps {
                return Err(BenchError::Timeout { steps: max_steps, outstanding: self.master.outstanding().len() });
            }
            let _ = self.tick()?;
        }
        Ok(self.cycle - start)
    }
}

impl<R: Responder<DATA_BYTES>> Testbench<R, DATA_BYTES> {
    /// Submits `op`, stepping while the tracker is full. Returns the id used.
    pub fn submit(&mut self, op: &Op, max_steps: u64) -> Result<Id, BenchError> {
        let start = self.cycle;
        loop {
            match self.try_submit(op) {
                Err(BenchError::Axi(Error::TrackerFull { .. } | Error::NoFreeId)) if self.cycle - start < max_steps => {
                    let _ = self.tick()?;
                }
                Err(BenchError::Axi(Error::TrackerFull { .. } | Error::NoFreeId)) => {
                    return Err(BenchError::Timeout { steps: max_steps, outstanding: self.master.outstanding().len() });
                }
                result => return result,
            }
        }
    }

    fn try_submit(&mut self, op: &Op) -> Result<Id, BenchError> {
        let id = match op.id {
            Some(raw) => {
                Id::new(u128::from(raw)).map_err(|_| BenchError::InvalidOp { reason: "id must be below 4096" })?
            }
            None => self.master.alloc_id()?,
        };
        let user =
            User::new(u128::from(op.user)).map_err(|_| BenchError::InvalidOp { reason: "user must be below 16" })?;
        let req = Request::new(id, op.addr, Size::from_bytes(op.size)?, BurstLen::new(op.len)?, op.burst.into())
            .with_sideband(Sideband { user, ..Sideband::default() });
        let id = match op.kind {
            OpKind::Write => self.master.submit_write(req, op.data.iter().map(|word| word.to_le_bytes()).collect())?,
            OpKind::Read => self.master.submit_read(req)?,
        };
        Ok(id)
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Steps until the master was idle.
    pub steps: u64,
    /// Events in the order they were reported.
    pub events: Vec<Event>,
    /// Master counters.
    pub stats: Stats,
    /// Read beats whose data differed from the expected word.
    pub mismatches: Vec<String>,
    /// Handshake trace, if requested.
    pub trace: Option<WireTrace>,
}

impl ScenarioReport {
    /// Whether the scenario ran without aborts, unexpected responses or data mismatches.
    pub fn passed(&self) -> bool {
        self.stats.aborted == 0 && self.stats.unexpected_responses == 0 && self.mismatches.is_empty()
    }
}

/// Runs `scenario` against a fresh memory slave on a 32-bit bus.
pub fn run_scenario(config: &BenchConfig, scenario: &Scenario, trace: bool) -> Result<ScenarioReport, BenchError> {
    info!(name = %scenario.name, ops = scenario.ops.len(), "scenario");
    let master = MasterAdapter::<DATA_BYTES>::new(config.master)?;
    let mut bench = Testbench::new(master, MemoryResponder::new(config.responder));
    if trace {
        bench = bench.with_trace();
    }

    let mut check = ReadCheck::default();
    for op in &scenario.ops {
        if op.wait {
            let _ = bench.run_until_idle(config.max_steps)?;
        }
        let id = bench.submit(op, config.max_steps)?;
        debug!(%id, kind = ?op.kind, addr = op.addr, "submitted");
        // The new read has not stepped yet, so everything queued belongs to earlier requests.
        check.extend(bench.master.events());
        if op.kind == OpKind::Read && !op.expect.is_empty() {
            let _ = check.expected.insert(id, op.expect.clone());
        }
    }
    let _ = bench.run_until_idle(config.max_steps)?;
    check.extend(bench.master.events());

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        steps: bench.cycle(),
        events: check.events,
        stats: *bench.master.stats(),
        mismatches: check.mismatches,
        trace: bench.trace().cloned(),
    })
}

/// Compares read beats with the expectation of the read that is live under their id.
#[derive(Debug, Default)]
struct ReadCheck {
    expected: HashMap<Id, Vec<u32>>,
    events: Vec<Event>,
    mismatches: Vec<String>,
}

impl ReadCheck {
    fn extend(&mut self, events: impl Iterator<Item = Event>) {
        for event in events {
            match &event {
                Event::ReadBeat(beat) => {
                    if let Some(want) = self.expected.get(&beat.id).and_then(|words| words.get(beat.index)) {
                        let got = u32::from_le_bytes(beat.data);
                        if got != *want {
                            let at = format!("id {} beat {}", beat.id, beat.index);
                            self.mismatches.push(format!("{}: read {:#010x}, expected {:#010x}", at, got, want));
                        }
                    }
                }
                Event::ReadDone { id, .. } | Event::Aborted { id, .. } => {
                    let _ = self.expected.remove(id);
                }
                Event::WriteDone { .. } | Event::Unexpected { .. } => {}
            }
            self.events.push(event);
        }
    }
}
