use bitflags::bitflags;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct CharProps: u8 {
        /// Permits broadcasts of the Characteristic Value using Server
        /// Characteristic Configuration Descriptor.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permit writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. A Client Characteristic Configuration Descriptor is
        /// added for the characteristic.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        /// A Client Characteristic Configuration Descriptor is added for the
        /// characteristic.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
    }
}

impl CharProps {
    /// Returns whether the client can subscribe to value updates.
    #[inline]
    #[must_use]
    pub const fn is_notifiable(self) -> bool {
        self.intersects(Self::NOTIFY.union(Self::INDICATE))
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Cccd: u16 {
        /// The Characteristic Value shall be notified.
        const NOTIFY = 1 << 0;
        /// The Characteristic Value shall be indicated.
        const INDICATE = 1 << 1;
    }
}

/// Security level required to access a characteristic value.
#[derive(
    Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[non_exhaustive]
pub enum SecurityLevel {
    /// Access is never permitted.
    NoAccess,
    /// No security required.
    #[default]
    Open,
    /// Unauthenticated encryption (Just Works pairing).
    JustWorks,
    /// Authenticated encryption (MITM-protected pairing).
    Mitm,
}

/// Service declaration type ([Vol 3] Part G, Section 3.1).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum ServiceType {
    Primary = 0x01,
    Secondary = 0x02,
}

impl Default for ServiceType {
    #[inline(always)]
    fn default() -> Self {
        Self::Primary
    }
}

/// Write operation reported with a write authorization request. The values
/// match the controller's numeric operation codes.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum WriteOp {
    /// Write request (acknowledged).
    WriteReq = 0x01,
    /// Write command (unacknowledged).
    WriteCmd = 0x02,
    /// Signed write command (unacknowledged).
    SignedWriteCmd = 0x03,
    /// Prepare write request: one chunk of a queued write.
    PrepareWriteReq = 0x04,
    /// Execute write request with the cancel flag.
    ExecWriteCancel = 0x05,
    /// Execute write request with the write-now flag.
    ExecWriteNow = 0x06,
}

impl WriteOp {
    /// Returns whether this is a connection-wide execute/cancel control that is
    /// not scoped to any single attribute.
    #[inline]
    #[must_use]
    pub const fn is_exec(self) -> bool {
        matches!(self, Self::ExecWriteCancel | Self::ExecWriteNow)
    }
}

/// Value push type.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum HvxKind {
    /// Unacknowledged push.
    Notification = 0x01,
    /// Push that the client must confirm.
    Indication = 0x02,
}

crate::impl_display_via_debug! { SecurityLevel, ServiceType, WriteOp, HvxKind }
