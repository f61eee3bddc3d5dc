//! Sparse memory slave.
//!
//! Writes are committed once the address and every data beat have arrived, in either order.
//! Responses leave after a configurable latency, and readiness on the request channels can be
//! throttled to exercise backpressure. Accesses at or above `memory_bytes` answer `DecErr`.

use std::collections::{HashMap, VecDeque};

use busflow::*;
use busflow_axi::{Bus, ReadData, Request, Resp, Responder, Transfers, WriteData, WriteResp, DATA_BYTES};
use serde::Deserialize;
use tracing::trace;

/// Memory slave configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponderConfig {
    /// Extra steps between the last request handshake and the first response offer.
    pub latency: u64,

    /// AW, W and AR are ready on every `ready_period`-th step only. 0 and 1 mean always ready.
    pub ready_period: u64,

    /// Size of the decoded address range.
    pub memory_bytes: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self { Self { latency: 2, ready_period: 1, memory_bytes: 1 << 20 } }
}

#[derive(Debug, Clone)]
struct ReadJob<const B: usize> {
    due: u64,
    beats: VecDeque<ReadData<B>>,
}

/// Memory slave.
#[derive(Debug, Clone)]
pub struct MemoryResponder<const B: usize = DATA_BYTES> {
    config: ResponderConfig,
    memory: HashMap<u64, u8>,
    cycle: u64,

    /// Write addresses whose data has not fully arrived.
    writes: VecDeque<Request>,
    /// Write data beats not yet matched with an address.
    data: VecDeque<WriteData<B>>,

    responses: VecDeque<(u64, WriteResp)>,
    reads: VecDeque<ReadJob<B>>,
}

impl<const B: usize> MemoryResponder<B> {
    /// Creates an empty memory.
    pub fn new(config: ResponderConfig) -> Self {
        Self {
            config,
            memory: HashMap::new(),
            cycle: 0,
            writes: VecDeque::new(),
            data: VecDeque::new(),
            responses: VecDeque::new(),
            reads: VecDeque::new(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &ResponderConfig { &self.config }

    /// Number of steps observed.
    pub fn cycle(&self) -> u64 { self.cycle }

    /// Whether every accepted request has been answered.
    pub fn is_idle(&self) -> bool {
        self.writes.is_empty() && self.data.is_empty() && self.responses.is_empty() && self.reads.is_empty()
    }

    /// Stores `bytes` from `addr` on, bypassing the bus.
    pub fn load(&mut self, addr: u64, bytes: &[u8]) {
        for (offset, byte) in bytes.iter().enumerate() {
            let _ = self.memory.insert(addr + offset as u64, *byte);
        }
    }

    /// Reads `len` bytes from `addr` on, bypassing the bus. Unwritten bytes read as zero.
    pub fn peek(&self, addr: u64, len: usize) -> Vec<u8> {
        (0..len as u64).map(|offset| self.memory.get(&(addr + offset)).copied().unwrap_or(0)).collect()
    }

    fn decodes(&self, addr: u32) -> bool { u64::from(addr) < self.config.memory_bytes }

    fn ready_now(&self) -> bool { self.config.ready_period <= 1 || self.cycle % self.config.ready_period == 0 }

    fn due(&self) -> u64 { self.cycle + 1 + self.config.latency }

    /// Byte lanes of the bus word containing `addr`.
    fn lanes(&self, addr: u32) -> [u8; B] {
        let base = align_down(u64::from(addr), B as u64);
        let mut data = [0; B];
        for (lane, byte) in data.iter_mut().enumerate() {
            *byte = self.memory.get(&(base + lane as u64)).copied().unwrap_or(0);
        }
        data
    }

    fn write_burst(&mut self, req: &Request, beats: &[WriteData<B>]) -> Resp {
        let burst = ok_or!(req.burst_config(), return Resp::SlvErr);
        if beats.len() != burst.beats() {
            return Resp::SlvErr;
        }
        let mut resp = Resp::Okay;
        for (addr, beat) in burst.addrs().zip(beats) {
            if !self.decodes(addr) {
                resp = Resp::DecErr;
                continue;
            }
            let base = align_down(u64::from(addr), B as u64);
            for lane in (0..B).filter(|lane| beat.strb.bit(*lane)) {
                let _ = self.memory.insert(base + lane as u64, beat.data[lane]);
            }
        }
        resp
    }

    /// Commits every write whose address and final data beat have both arrived.
    fn commit_writes(&mut self) {
        while let Some(req) = self.writes.front().copied() {
            let end = some_or!(self.data.iter().position(|beat| beat.last), return);
            let beats = self.data.drain(..=end).collect::<Vec<_>>();
            let _ = self.writes.pop_front();
            let resp = self.write_burst(&req, &beats);
            trace!(id = %req.id, addr = req.addr, ?resp, "write committed");
            self.responses.push_back((self.due(), WriteResp { id: req.id, resp, user: req.side.user }));
        }
    }

    /// Reads are served from the memory contents at the address handshake.
    fn read_job(&self, req: &Request) -> ReadJob<B> {
        let len = req.len.beats();
        let beat = |index: usize, data: [u8; B], resp: Resp| ReadData {
            id: req.id,
            data,
            resp,
            last: index + 1 == len,
            user: req.side.user,
        };
        let beats = match req.burst_config() {
            Ok(burst) => burst
                .addrs()
                .enumerate()
                .map(|(index, addr)| {
                    let resp = if self.decodes(addr) { Resp::Okay } else { Resp::DecErr };
                    beat(index, self.lanes(addr), resp)
                })
                .collect(),
            Err(_) => (0..len).map(|index| beat(index, [0; B], Resp::SlvErr)).collect(),
        };
        ReadJob { due: self.due(), beats }
    }
}

impl<const B: usize> Responder<B> for MemoryResponder<B> {
    fn drive(&mut self, bus: &mut Bus<B>) -> Result<(), busflow_axi::Error> {
        if self.ready_now() {
            bus.aw.accept();
            bus.w.accept();
            bus.ar.accept();
        }
        if let Some((due, resp)) = self.responses.front() {
            if *due <= self.cycle {
                bus.b.offer(*resp)?;
            }
        }
        if let Some(job) = self.reads.front().filter(|job| job.due <= self.cycle) {
            if let Some(beat) = job.beats.front() {
                bus.r.offer(beat.clone())?;
            }
        }
        Ok(())
    }

    fn observe(&mut self, fired: &Transfers<B>) {
        if fired.b.is_some() {
            let _ = self.responses.pop_front();
        }
        if fired.r.is_some() {
            if let Some(job) = self.reads.front_mut() {
                let _ = job.beats.pop_front();
                if job.beats.is_empty() {
                    let _ = self.reads.pop_front();
                }
            }
        }
        if let Some(req) = fired.aw {
            self.writes.push_back(req);
        }
        if let Some(beat) = &fired.w {
            self.data.push_back(beat.clone());
        }
        self.commit_writes();
        if let Some(req) = &fired.ar {
            let job = self.read_job(req);
            self.reads.push_back(job);
        }
        self.cycle += 1;
    }
}
