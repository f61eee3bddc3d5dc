//! Bit-representable values.

use std::fmt::Debug;

use crate::join_options;

/// Port names and bitwidths of a signal.
///
/// A bus channel is carried on several named wires. `PortDecls` keeps the name and width of each of
/// them, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortDecls {
    /// Named members. A `None` name splices the member's ports into the parent without a prefix.
    Struct(Vec<(Option<String>, PortDecls)>),

    /// A single wire of the given width.
    Bits(usize),
}

impl PortDecls {
    /// Total width in bits.
    pub fn width(&self) -> usize {
        match self {
            PortDecls::Struct(inner) => inner.iter().map(|(_, m)| m.width()).sum(),
            PortDecls::Bits(width) => *width,
        }
    }

    /// Flattens the declarations into `(name, width)` pairs, joining nested names with `_`.
    ///
    /// Zero-width members are dropped.
    pub fn flatten(&self, prefix: Option<&str>) -> Vec<(String, usize)> {
        match self {
            PortDecls::Struct(inner) => inner
                .iter()
                .flat_map(|(name, member)| {
                    let prefix = join_options("_", [prefix.map(str::to_string), name.clone()]);
                    member.flatten(prefix.as_deref())
                })
                .collect(),
            PortDecls::Bits(0) => vec![],
            PortDecls::Bits(width) => vec![(prefix.unwrap_or_default().to_string(), *width)],
        }
    }
}

/// Bit-representable values.
pub trait Signal: 'static + Debug + Clone {
    /// Signal's bit width.
    ///
    /// # Note
    ///
    /// `Self::WIDTH` and `Self::port_decls().width()` should be equal.
    const WIDTH: usize;

    /// Translates the value into its wire bits, least significant bit first.
    fn transl(self) -> Vec<bool>;

    /// Port names and bitwidths.
    ///
    /// # Example
    ///
    /// The write response channel payload is declared as:
    ///
    /// ```ignore
    /// Struct([
    ///     (Some("id"), Bits(12)),
    ///     (Some("resp"), Bits(2)),
    ///     (Some("user"), Bits(4)),
    /// ])
    /// ```
    fn port_decls() -> PortDecls;
}

impl Signal for () {
    const WIDTH: usize = 0;

    fn transl(self) -> Vec<bool> { vec![] }

    fn port_decls() -> PortDecls { PortDecls::Bits(0) }
}

impl Signal for bool {
    const WIDTH: usize = 1;

    fn transl(self) -> Vec<bool> { vec![self] }

    fn port_decls() -> PortDecls { PortDecls::Bits(1) }
}

macro_rules! impl_signal {
    ($typ:ty) => {
        impl Signal for $typ {
            const WIDTH: usize = ::std::mem::size_of::<$typ>() * 8;

            fn transl(self) -> Vec<bool> {
                #[allow(trivial_numeric_casts)]
                (0..(::std::mem::size_of::<$typ>() * 8)).map(|i| (self & ((1 as $typ) << i)) != 0).collect::<Vec<_>>()
            }

            fn port_decls() -> PortDecls { PortDecls::Bits(Self::WIDTH) }
        }
    };
}

impl_signal!(u8);
impl_signal!(u16);
impl_signal!(u32);
impl_signal!(u64);

/// Arrays are packed element 0 first, i.e. element 0 occupies the least significant bits.
impl<V: Signal, const N: usize> Signal for [V; N] {
    const WIDTH: usize = V::WIDTH * N;

    fn transl(self) -> Vec<bool> { self.into_iter().flat_map(Signal::transl).collect() }

    fn port_decls() -> PortDecls { PortDecls::Bits(Self::WIDTH) }
}
