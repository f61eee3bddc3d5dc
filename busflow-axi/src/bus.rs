//! The five AXI4 channels.

use busflow::*;

use crate::error::Error;
use crate::types::{ReadData, Request, WriteData, WriteResp, DATA_BYTES};

/// AXI4 bus between one master and one responder.
///
/// Each side stages its signals on the channels during a step; [`Bus::commit`] is the clock edge.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct Bus<const B: usize = DATA_BYTES> {
    pub aw: VrChannel<Request>,
    pub w: VrChannel<WriteData<B>>,
    pub b: VrChannel<WriteResp>,
    pub ar: VrChannel<Request>,
    pub r: VrChannel<ReadData<B>>,
}

/// Handshakes that fired at one clock edge.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfers<const B: usize = DATA_BYTES> {
    pub aw: Option<Request>,
    pub w: Option<WriteData<B>>,
    pub b: Option<WriteResp>,
    pub ar: Option<Request>,
    pub r: Option<ReadData<B>>,
}

impl<const B: usize> Transfers<B> {
    /// Whether no handshake fired.
    pub fn is_idle(&self) -> bool {
        self.aw.is_none() && self.w.is_none() && self.b.is_none() && self.ar.is_none() && self.r.is_none()
    }
}

impl<const B: usize> Default for Bus<B> {
    fn default() -> Self { Self::new() }
}

impl<const B: usize> Bus<B> {
    /// Creates an idle bus.
    pub fn new() -> Self {
        Self {
            aw: VrChannel::new("aw"),
            w: VrChannel::new("w"),
            b: VrChannel::new("b"),
            ar: VrChannel::new("ar"),
            r: VrChannel::new("r"),
        }
    }

    /// Clock edge: commits all five channels.
    pub fn commit(&mut self) -> Result<Transfers<B>, Error> {
        Ok(Transfers {
            aw: self.aw.commit()?,
            w: self.w.commit()?,
            b: self.b.commit()?,
            ar: self.ar.commit()?,
            r: self.r.commit()?,
        })
    }

    /// Every wire of the bus as `(name, width)`, channel by channel.
    pub fn ports() -> Vec<(String, usize)> {
        [
            ("aw", VrChannel::<Request>::port_decls()),
            ("w", VrChannel::<WriteData<B>>::port_decls()),
            ("b", VrChannel::<WriteResp>::port_decls()),
            ("ar", VrChannel::<Request>::port_decls()),
            ("r", VrChannel::<ReadData<B>>::port_decls()),
        ]
        .iter()
        .flat_map(|(name, decls)| decls.flatten(Some(name)))
        .collect()
    }
}

/// The slave side of the bus.
///
/// Like the master, a responder decides its signals from its own state only, then learns which
/// handshakes fired.
pub trait Responder<const B: usize> {
    /// Stages ready on AW, W and AR and valid on B and R for this step.
    fn drive(&mut self, bus: &mut Bus<B>) -> Result<(), Error>;

    /// Consumes the handshakes of the step just committed.
    fn observe(&mut self, fired: &Transfers<B>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_list() {
        let ports = Bus::<4>::ports();
        let width = |name: &str| ports.iter().find(|(n, _)| n == name).map(|(_, w)| *w);
        assert_eq!(width("aw_id"), Some(12));
        assert_eq!(width("aw_valid"), Some(1));
        assert_eq!(width("w_data"), Some(32));
        assert_eq!(width("w_strb"), Some(4));
        assert_eq!(width("b_ready"), Some(1));
        assert_eq!(width("r_last"), Some(1));
        // 11 request fields + valid + ready on each address channel.
        assert_eq!(ports.iter().filter(|(n, _)| n.starts_with("ar_")).count(), 13);
    }
}
