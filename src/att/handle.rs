use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

use crate::name_of;

/// Attribute handle ([Vol 3] Part F, Section 3.2.2).
#[allow(clippy::unsafe_derive_deserialize)]
#[derive(
    Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Handle(NonZeroU16);

impl Handle {
    /// Lowest valid handle.
    pub const MIN: Self = Self(
        // SAFETY: Non-zero
        unsafe { NonZeroU16::new_unchecked(0x0001) },
    );
    /// Highest valid handle.
    pub const MAX: Self = Self(
        // SAFETY: Non-zero
        unsafe { NonZeroU16::new_unchecked(0xFFFF) },
    );

    /// Wraps a raw handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Option<Self> {
        match NonZeroU16::new(h) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Returns the next handle or `None` if the maximum handle was reached.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0.get().wrapping_add(1))
    }
}

impl Debug for Handle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", name_of!(Handle), self.0.get())
    }
}

impl Display for Handle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<Handle> for u16 {
    #[inline]
    fn from(h: Handle) -> Self {
        h.0.get()
    }
}

impl From<Handle> for usize {
    #[inline]
    fn from(h: Handle) -> Self {
        Self::from(h.0.get())
    }
}

/// Inclusive range of attribute handles. This is a `Copy` version of
/// `RangeInclusive<Handle>`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[must_use]
pub struct HandleRange {
    start: Handle,
    end: Handle,
}

impl HandleRange {
    /// Creates a new handle range `start..=end`.
    #[inline]
    pub const fn new(start: Handle, end: Handle) -> Self {
        assert!(start.0.get() <= end.0.get());
        Self { start, end }
    }

    /// Returns the starting handle.
    #[inline(always)]
    #[must_use]
    pub const fn start(self) -> Handle {
        self.start
    }

    /// Returns the ending handle.
    #[inline(always)]
    #[must_use]
    pub const fn end(self) -> Handle {
        self.end
    }

    /// Returns the range extended (or shrunk) to end at `end`.
    #[inline]
    pub(crate) const fn with_end(self, end: Handle) -> Self {
        Self::new(self.start, end)
    }
}

/// Sequential handle allocator. Handles are never reused.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct HandleAlloc {
    next: Option<Handle>,
}

impl HandleAlloc {
    /// Creates an allocator that starts at [`Handle::MIN`].
    #[inline]
    pub const fn new() -> Self {
        Self::starting_at(Handle::MIN)
    }

    /// Creates an allocator that starts at `first`.
    #[inline]
    pub const fn starting_at(first: Handle) -> Self {
        Self { next: Some(first) }
    }

    /// Allocates `n` consecutive handles. Returns `None` without consuming any
    /// handles if fewer than `n` remain.
    pub fn alloc(&mut self, n: u16) -> Option<HandleRange> {
        let start = self.next?;
        let end = Handle::new(u16::from(start).checked_add(n.checked_sub(1)?)?)?;
        self.next = end.next();
        Some(HandleRange::new(start, end))
    }
}

impl Default for HandleAlloc {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
