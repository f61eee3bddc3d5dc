//! AXI4 channel payloads.
//!
//! Field widths follow the 32-bit address map: 12-bit ids, 4-bit user sideband, and a data bus of
//! `B` bytes (32-bit data by default).

use std::fmt;

use busflow::*;
use static_assertions::*;

use crate::burst::BurstConfig;
use crate::error::Error;

/// Width of transaction ids in bits.
pub const ID_WIDTH: usize = 12;

/// Width of the user sideband in bits.
pub const USER_WIDTH: usize = 4;

/// Maximum number of beats in a burst.
pub const MAX_BURST_LEN: usize = 16;

/// Default data bus width in bytes.
pub const DATA_BYTES: usize = 4;

/// Number of distinct transaction ids.
pub const MAX_IDS: usize = 1 << ID_WIDTH;

const_assert_eq!(clog2(MAX_BURST_LEN), 4);
const_assert_eq!(clog2(MAX_IDS), ID_WIDTH);

/// Transaction id.
pub type Id = Bits<ID_WIDTH>;

/// User sideband.
pub type User = Bits<USER_WIDTH>;

/// Burst type. The reserved encoding 3 has no variant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Signal)]
#[width(2)]
pub enum Burst {
    /// Every beat uses the start address.
    Fixed,
    /// The address advances by the transfer size each beat.
    #[default]
    Incr,
    /// Like `Incr`, but wraps inside the aligned `size * len` block.
    Wrap,
}

/// Bytes per beat.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Signal)]
pub enum Size {
    B1,
    B2,
    B4,
    B8,
    B16,
    B32,
    B64,
    B128,
}

impl Size {
    /// Number of bytes per beat.
    pub const fn bytes(self) -> u32 { 1 << self as u32 }

    /// Size for a power-of-two byte count in `1..=128`.
    pub fn from_bytes(bytes: u32) -> Result<Self, Error> {
        Ok(match bytes {
            1 => Size::B1,
            2 => Size::B2,
            4 => Size::B4,
            8 => Size::B8,
            16 => Size::B16,
            32 => Size::B32,
            64 => Size::B64,
            128 => Size::B128,
            _ => return Err(Error::InvalidBurstConfig { reason: "transfer size must be a power of two in 1..=128" }),
        })
    }
}

/// Response status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Signal)]
pub enum Resp {
    /// Normal access success.
    #[default]
    Okay,
    /// Exclusive access success.
    ExOkay,
    /// Slave error.
    SlvErr,
    /// Decode error: no slave at the address.
    DecErr,
}

impl Resp {
    /// Whether the slave reported an error.
    pub fn is_error(self) -> bool { matches!(self, Resp::SlvErr | Resp::DecErr) }
}

/// Lock type. Two bits wide to keep the AXI3 encoding; the adapter rejects [`Lock::Locked`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Signal)]
#[width(2)]
pub enum Lock {
    /// Normal access.
    #[default]
    Normal,
    /// Exclusive access.
    Exclusive,
    /// Locked access, AXI3 only.
    Locked,
}

/// Burst length in beats, `1..=16`. On the wire it is encoded as `beats - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BurstLen(u8);

impl BurstLen {
    /// Single-beat burst.
    pub const ONE: BurstLen = BurstLen(1);

    /// Burst of `beats` beats.
    pub fn new(beats: usize) -> Result<Self, Error> {
        if !(1..=MAX_BURST_LEN).contains(&beats) {
            return Err(Error::InvalidBurstConfig { reason: "burst length must be in 1..=16" });
        }
        Ok(BurstLen(beats as u8))
    }

    /// Number of beats.
    pub const fn beats(self) -> usize { self.0 as usize }
}

impl fmt::Display for BurstLen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl Signal for BurstLen {
    const WIDTH: usize = 4;

    fn transl(self) -> Vec<bool> { Bits::<4>::truncate(u128::from(self.0 - 1)).transl() }

    fn port_decls() -> PortDecls { PortDecls::Bits(Self::WIDTH) }
}

/// Address channel sideband fields.
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Signal)]
pub struct Sideband {
    pub lock: Lock,
    pub cache: Bits<4>,
    pub prot: Bits<3>,
    pub qos: Bits<4>,
    pub region: Bits<4>,
    pub user: User,
}

/// Read or write request, the payload of the AR and AW channels.
///
/// Immutable once the address handshake accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Signal)]
pub struct Request {
    /// Transaction id.
    pub id: Id,
    /// Start address.
    pub addr: u32,
    /// Burst length.
    pub len: BurstLen,
    /// Transfer size.
    pub size: Size,
    /// Burst type.
    pub burst: Burst,
    /// Protection, cache, QoS, region and user fields.
    #[member(name = "")]
    pub side: Sideband,
}

const_assert_eq!(<Request as Signal>::WIDTH, 74);

impl Request {
    /// Creates a request with default sideband fields.
    pub fn new(id: Id, addr: u32, size: Size, len: BurstLen, burst: Burst) -> Self {
        Self { id, addr, len, size, burst, side: Sideband::default() }
    }

    /// Replaces the sideband fields.
    pub fn with_sideband(self, side: Sideband) -> Self { Self { side, ..self } }

    /// Validated address sequence of the burst.
    pub fn burst_config(&self) -> Result<BurstConfig, Error> {
        BurstConfig::new(self.addr, self.size, self.len, self.burst)
    }
}

/// Write data beat, the payload of the W channel.
#[derive(Debug, Clone, PartialEq, Eq, Signal)]
pub struct WriteData<const B: usize = DATA_BYTES> {
    /// Transaction id.
    pub id: Id,
    /// Data, byte lane 0 first.
    pub data: [u8; B],
    /// Byte lane strobes.
    pub strb: Bits<B>,
    /// Set on the final beat of the burst only.
    pub last: bool,
    /// User sideband.
    pub user: User,
}

/// Write response, the payload of the B channel.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Signal)]
pub struct WriteResp {
    pub id: Id,
    pub resp: Resp,
    pub user: User,
}

const_assert_eq!(<WriteResp as Signal>::WIDTH, 18);

/// Read data beat, the payload of the R channel.
#[derive(Debug, Clone, PartialEq, Eq, Signal)]
pub struct ReadData<const B: usize = DATA_BYTES> {
    /// Transaction id.
    pub id: Id,
    /// Data, byte lane 0 first.
    pub data: [u8; B],
    /// Response status of this beat.
    pub resp: Resp,
    /// Set on the final beat of the burst only.
    pub last: bool,
    /// User sideband.
    pub user: User,
}
