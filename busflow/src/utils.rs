//! Utilities.

use itertools::Itertools;

/// Returns ceiling log2.
pub const fn clog2(value: usize) -> usize {
    if value == 0 {
        0
    } else {
        (::std::mem::size_of::<usize>() * 8) - (value - 1).leading_zeros() as usize
    }
}

/// Return aligned value of `value` by `by`, rounding down. `by` must be a power of two.
///
/// ### Example
/// ```
/// assert_eq!(busflow::align_down(0x1007, 4), 0x1004);
/// ```
pub const fn align_down(value: u64, by: u64) -> u64 { value & !(by - 1) }

/// Combines all elements into one String, separated by `sep`. Returns `None` if all elements are `None`.
pub fn join_options<I>(sep: &str, iterable: I) -> Option<String>
where I: IntoIterator<Item = Option<String>> {
    let iterable = iterable.into_iter().flatten().collect::<Vec<_>>();
    if iterable.is_empty() {
        None
    } else {
        Some(iterable.join(sep))
    }
}

/// Formats LSB-first bits as a hexadecimal string, most significant nibble first.
///
/// ### Example
/// ```
/// assert_eq!(busflow::bits_to_hex(&[true, false, true, true, true]), "0x1d");
/// ```
pub fn bits_to_hex(bits: &[bool]) -> String {
    if bits.is_empty() {
        return "0x0".to_string();
    }
    let nibbles = bits
        .chunks(4)
        .map(|nibble| nibble.iter().rev().fold(0u32, |acc, bit| (acc << 1) | u32::from(*bit)))
        .collect::<Vec<_>>();
    format!("0x{}", nibbles.iter().rev().map(|n| format!("{:x}", n)).join(""))
}

/// Ok or executing the given expression.
#[macro_export]
macro_rules! ok_or {
    ($e:expr, $err:expr) => {{
        match $e {
            Ok(r) => r,
            Err(_) => $err,
        }
    }};
}

/// Some or executing the given expression.
#[macro_export]
macro_rules! some_or {
    ($e:expr, $err:expr) => {{
        match $e {
            Some(r) => r,
            None => $err,
        }
    }};
}
