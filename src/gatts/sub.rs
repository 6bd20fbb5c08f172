use crate::att::Handle;

use super::*;

/// Client subscription state of a notifiable characteristic.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SubscriptionState {
    #[default]
    NotSubscribed,
    Notify,
    Indicate,
}

impl SubscriptionState {
    /// Decodes a CCCD payload. Missing bytes are treated as zero and unknown
    /// bits are ignored. When both bits are set, `prefer_ind` decides the
    /// result.
    #[must_use]
    pub fn from_cccd(v: &[u8], prefer_ind: bool) -> Self {
        let raw = u16::from_le_bytes([
            v.first().copied().unwrap_or_default(),
            v.get(1).copied().unwrap_or_default(),
        ]);
        let c = Cccd::from_bits_truncate(raw);
        match (c.contains(Cccd::NOTIFY), c.contains(Cccd::INDICATE)) {
            (true, true) if prefer_ind => Self::Indicate,
            (true, _) => Self::Notify,
            (false, true) => Self::Indicate,
            (false, false) => Self::NotSubscribed,
        }
    }

    /// Returns the value push type for this state.
    #[inline]
    #[must_use]
    pub const fn hvx_kind(self) -> Option<HvxKind> {
        match self {
            Self::NotSubscribed => None,
            Self::Notify => Some(HvxKind::Notification),
            Self::Indicate => Some(HvxKind::Indication),
        }
    }

    /// Returns whether the client wants value updates.
    #[inline(always)]
    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        !matches!(self, Self::NotSubscribed)
    }
}

crate::impl_display_via_debug! { SubscriptionState }

/// Subscription tracker. Characteristics without a CCCD never leave the
/// `NotSubscribed` state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(super) struct Subscription {
    hdl: Option<Handle>,
    state: SubscriptionState,
}

impl Subscription {
    #[inline]
    pub const fn new(cccd: Option<Handle>) -> Self {
        Self {
            hdl: cccd,
            state: SubscriptionState::NotSubscribed,
        }
    }

    /// Returns the CCCD handle.
    #[inline(always)]
    pub const fn handle(&self) -> Option<Handle> {
        self.hdl
    }

    #[inline(always)]
    pub const fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Updates the state from a CCCD write and returns the new state.
    pub fn write(&mut self, v: &[u8], prefer_ind: bool) -> SubscriptionState {
        self.state = SubscriptionState::from_cccd(v, prefer_ind);
        self.state
    }

    /// Resets the state after a disconnect. Returns whether the state changed.
    pub fn reset(&mut self) -> bool {
        if self.hdl.is_none() || !self.state.is_subscribed() {
            return false;
        }
        self.state = SubscriptionState::NotSubscribed;
        true
    }
}
