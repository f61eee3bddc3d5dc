//! Valid-ready channels.
//!
//! A channel is stepped in two phases. During a step the producer stages a payload with
//! [`VrChannel::offer`] and the consumer stages its readiness with [`VrChannel::accept`]. Neither
//! side can observe what the partner staged in the same step, so `ready` never depends
//! combinationally on `valid` (and vice versa). [`VrChannel::commit`] is the clock edge: a transfer
//! fires iff both were staged, and the payload is handed to the consumer exactly once.
//!
//! A payload that was offered but not accepted stays registered as *stalled*. The producer must
//! offer the identical payload again on every following step until it is accepted, or
//! [`VrChannel::withdraw`] it.

use thiserror::Error;
use tracing::trace;

use crate::*;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("{channel}: payload changed while stalled")]
    PayloadMutated { channel: &'static str },

    #[error("{channel}: valid dropped before the handshake completed")]
    ValidDropped { channel: &'static str },

    #[error("{channel}: nothing offered")]
    NotOffered { channel: &'static str },

    #[error("{channel}: offered twice in one step")]
    AlreadyOffered { channel: &'static str },
}

/// Valid/ready channel's forward wires.
#[derive(Debug, Clone, Signal)]
pub struct Valid<V: Signal> {
    /// Inner data
    #[member(name = "")]
    pub inner: V,

    /// Valid bit
    pub valid: bool,
}

/// Ready wire.
#[derive(Debug, Clone, Signal)]
pub struct Ready {
    /// Ready bit
    pub ready: bool,
}

/// Valid-ready channel carrying payloads of type `V`.
#[derive(Debug, Clone)]
pub struct VrChannel<V: Signal> {
    name: &'static str,

    /// Payload staged by the producer in the current step.
    offered: Option<V>,

    /// Readiness staged by the consumer in the current step.
    ready: bool,

    /// Payload offered in the previous step that did not transfer.
    stalled: Option<V>,

    transfers: u64,
    stall_steps: u64,
}

impl<V: Signal + PartialEq> VrChannel<V> {
    /// Creates an idle channel.
    pub fn new(name: &'static str) -> Self {
        Self { name, offered: None, ready: false, stalled: None, transfers: 0, stall_steps: 0 }
    }

    /// Channel name, used as the wire prefix.
    pub fn name(&self) -> &'static str { self.name }

    /// Producer side: offers `payload` for transfer in this step.
    ///
    /// A stalled channel only takes the identical payload.
    pub fn offer(&mut self, payload: V) -> Result<(), ChannelError> {
        if self.offered.is_some() {
            return Err(ChannelError::AlreadyOffered { channel: self.name });
        }
        if let Some(stalled) = &self.stalled {
            if *stalled != payload {
                return Err(ChannelError::PayloadMutated { channel: self.name });
            }
        }
        self.offered = Some(payload);
        Ok(())
    }

    /// Consumer side: declares readiness for this step.
    pub fn accept(&mut self) { self.ready = true; }

    /// Producer side: takes back a payload that has not transferred.
    pub fn withdraw(&mut self) -> Result<V, ChannelError> {
        let staged = self.offered.take();
        let stalled = self.stalled.take();
        let payload = some_or!(staged.or(stalled), return Err(ChannelError::NotOffered { channel: self.name }));
        trace!(channel = self.name, ?payload, "withdrawn");
        Ok(payload)
    }

    /// Whether a payload offered in an earlier step is still waiting for `ready`.
    pub fn is_stalled(&self) -> bool { self.stalled.is_some() }

    /// The stalled payload, if any.
    pub fn stalled(&self) -> Option<&V> { self.stalled.as_ref() }

    /// Number of completed transfers.
    pub fn transfers(&self) -> u64 { self.transfers }

    /// Number of steps in which a payload was offered but not accepted.
    pub fn stall_steps(&self) -> u64 { self.stall_steps }

    /// Clock edge. Returns the transferred payload, if the handshake fired.
    pub fn commit(&mut self) -> Result<Option<V>, ChannelError> {
        let ready = ::std::mem::take(&mut self.ready);
        match self.offered.take() {
            Some(payload) if ready => {
                self.stalled = None;
                self.transfers += 1;
                trace!(channel = self.name, ?payload, "transfer");
                Ok(Some(payload))
            }
            Some(payload) => {
                self.stall_steps += 1;
                self.stalled = Some(payload);
                Ok(None)
            }
            None => match self.stalled.take() {
                Some(_) => Err(ChannelError::ValidDropped { channel: self.name }),
                None => Ok(None),
            },
        }
    }

    /// Port names and bitwidths of the channel, forward wires first.
    pub fn port_decls() -> PortDecls {
        PortDecls::Struct(vec![(None, Valid::<V>::port_decls()), (None, Ready::port_decls())])
    }
}
