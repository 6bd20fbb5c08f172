use std::fmt::{Debug, Formatter};
use std::num::NonZeroU128;
use std::str::FromStr;

const SHIFT: u32 = u128::BITS - u32::BITS;
const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;
const MASK_16: u128 = !((u16::MAX as u128) << SHIFT);
const MASK_32: u128 = !((u32::MAX as u128) << SHIFT);

/// 16-, 32-, or 128-bit UUID ([Vol 3] Part B, Section 2.5.1).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Uuid(NonZeroU128);

impl Uuid {
    /// UUID size in bytes.
    pub const BYTES: usize = std::mem::size_of::<Self>();

    /// Creates a UUID from a `u128`. Returns `None` if `v` is zero.
    #[inline]
    #[must_use]
    pub const fn new(v: u128) -> Option<Self> {
        match NonZeroU128::new(v) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Creates an assigned 16-bit Bluetooth SIG UUID. Returns `None` if `v` is
    /// zero.
    #[inline]
    #[must_use]
    pub const fn from_u16(v: u16) -> Option<Self> {
        if v == 0 {
            return None;
        }
        Self::new((v as u128) << SHIFT | BASE)
    }

    /// Creates an assigned 32-bit Bluetooth SIG UUID. Returns `None` if `v` is
    /// zero.
    #[inline]
    #[must_use]
    pub const fn from_u32(v: u32) -> Option<Self> {
        if v == 0 {
            return None;
        }
        Self::new((v as u128) << SHIFT | BASE)
    }

    /// Converts an assigned 16-bit Bluetooth SIG UUID to `u16`. This is
    /// mutually exclusive with `as_u32` and `as_u128`.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> Option<u16> {
        #[allow(clippy::cast_possible_truncation)]
        let v = (self.0.get() >> SHIFT) as u16;
        if self.0.get() & MASK_16 == BASE && v > 0 {
            Some(v)
        } else {
            None
        }
    }

    /// Converts an assigned 32-bit Bluetooth SIG UUID to `u32`. This is
    /// mutually exclusive with `as_u16` and `as_u128`.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> Option<u32> {
        #[allow(clippy::cast_possible_truncation)]
        let v = (self.0.get() >> SHIFT) as u32;
        if self.0.get() & MASK_32 == BASE && v > u16::MAX as u32 {
            Some(v)
        } else {
            None
        }
    }

    /// Converts a vendor-specific UUID to `u128`. This is mutually exclusive
    /// with `as_u16` and `as_u32`.
    #[inline]
    #[must_use]
    pub const fn as_u128(self) -> Option<u128> {
        if self.0.get() & MASK_32 == BASE {
            None
        } else {
            Some(self.0.get())
        }
    }

    /// Returns the UUID as a little-endian byte array.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::BYTES] {
        self.0.get().to_le_bytes()
    }
}

impl Debug for Uuid {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(v) = self.as_u16() {
            write!(f, "{v:#06X}")
        } else if let Some(v) = self.as_u32() {
            write!(f, "{v:#010X}")
        } else {
            let v = self.0.get();
            write!(
                f,
                "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
                (v >> 96) as u32,
                (v >> 80) as u16,
                (v >> 64) as u16,
                (v >> 48) as u16,
                (v & ((1 << 48) - 1)) as u64
            )
        }
    }
}

crate::impl_display_via_debug! { Uuid }

impl From<Uuid> for u128 {
    #[inline]
    fn from(u: Uuid) -> Self {
        u.0.get()
    }
}

/// Error returned for text or numbers that do not describe a valid UUID.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid UUID: {0:?}")]
pub struct UuidError(String);

/// Parses `"180D"`, `"0x180D"`, 32-bit `"0000180D"`, or the canonical
/// `"0000180D-0000-1000-8000-00805F9B34FB"` form.
impl FromStr for Uuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || UuidError(s.to_owned());
        let hex = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_hexdigit());
        let t = (s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))).unwrap_or(s);
        let u = if t.len() <= 8 && hex(t) {
            u32::from_str_radix(t, 16).ok().and_then(Self::from_u32)
        } else if t.split('-').map(str::len).eq([8, 4, 4, 4, 12]) {
            let v: String = t.split('-').collect();
            if hex(&v) {
                u128::from_str_radix(&v, 16).ok().and_then(Self::new)
            } else {
                None
            }
        } else {
            None
        };
        u.ok_or_else(err)
    }
}

impl TryFrom<&str> for Uuid {
    type Error = UuidError;

    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<u16> for Uuid {
    type Error = UuidError;

    #[inline]
    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Self::from_u16(v).ok_or_else(|| UuidError(format!("{v:#06X}")))
    }
}
