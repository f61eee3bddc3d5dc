//! Scripted slave for fault injection.

use std::collections::VecDeque;

use busflow_axi::{Bus, ReadData, Responder, Transfers, WriteResp, DATA_BYTES};

/// Slave that offers B and R payloads at fixed steps, whatever the master did.
///
/// A payload is offered from its step on until it is accepted. The request channels are ready
/// unless [`hold_ready`](Self::hold_ready) turned them off.
#[derive(Debug, Clone)]
pub struct ScriptedResponder<const B: usize = DATA_BYTES> {
    cycle: u64,
    ready: bool,
    b: VecDeque<(u64, WriteResp)>,
    r: VecDeque<(u64, ReadData<B>)>,
    log: Vec<(u64, Transfers<B>)>,
}

impl<const B: usize> Default for ScriptedResponder<B> {
    fn default() -> Self { Self { cycle: 0, ready: true, b: VecDeque::new(), r: VecDeque::new(), log: Vec::new() } }
}

fn insert_sorted<T>(queue: &mut VecDeque<(u64, T)>, at: u64, item: T) {
    let index = queue.iter().position(|(due, _)| *due > at).unwrap_or(queue.len());
    queue.insert(index, (at, item));
}

impl<const B: usize> ScriptedResponder<B> {
    /// Creates a slave with an empty script.
    pub fn new() -> Self { Self::default() }

    /// Offers `resp` on B from step `at` on.
    pub fn respond_b(&mut self, at: u64, resp: WriteResp) -> &mut Self {
        insert_sorted(&mut self.b, at, resp);
        self
    }

    /// Offers `beat` on R from step `at` on.
    pub fn respond_r(&mut self, at: u64, beat: ReadData<B>) -> &mut Self {
        insert_sorted(&mut self.r, at, beat);
        self
    }

    /// Turns readiness on AW, W and AR off (`true`) or back on (`false`).
    pub fn hold_ready(&mut self, hold: bool) -> &mut Self {
        self.ready = !hold;
        self
    }

    /// Steps observed so far.
    pub fn cycle(&self) -> u64 { self.cycle }

    /// Whether every scripted payload was accepted.
    pub fn is_done(&self) -> bool { self.b.is_empty() && self.r.is_empty() }

    /// Non-idle steps with the handshakes that fired.
    pub fn log(&self) -> &[(u64, Transfers<B>)] { &self.log }
}

impl<const B: usize> Responder<B> for ScriptedResponder<B> {
    fn drive(&mut self, bus: &mut Bus<B>) -> Result<(), busflow_axi::Error> {
        if self.ready {
            bus.aw.accept();
            bus.w.accept();
            bus.ar.accept();
        }
        if let Some((_, resp)) = self.b.front().filter(|(at, _)| *at <= self.cycle) {
            bus.b.offer(*resp)?;
        }
        if let Some((_, beat)) = self.r.front().filter(|(at, _)| *at <= self.cycle) {
            bus.r.offer(beat.clone())?;
        }
        Ok(())
    }

    fn observe(&mut self, fired: &Transfers<B>) {
        if fired.b.is_some() {
            let _ = self.b.pop_front();
        }
        if fired.r.is_some() {
            let _ = self.r.pop_front();
        }
        if !fired.is_idle() {
            self.log.push((self.cycle, fired.clone()));
        }
        self.cycle += 1;
    }
}
