/// Maximum attribute value length ([Vol 3] Part F, Section 3.2.9).
pub const MAX_VAL_LEN: usize = 512;

/// ATT and Common Profile and Service error codes
/// ([Vol 3] Part F, Section 3.4.1.1 and \[CSS\] Part B, Section 1.2).
///
/// The server runtime only ever reports these to the remote client through an
/// authorization reply. They are never raised as local errors.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
    thiserror::Error,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum ErrorCode {
    /// Invalid attribute handle.
    InvalidHandle = 0x01,
    /// The attribute cannot be read.
    ReadNotPermitted = 0x02,
    /// The attribute cannot be written.
    WriteNotPermitted = 0x03,
    /// The attribute PDU was invalid.
    InvalidPdu = 0x04,
    /// Authentication is required before the attribute can be accessed.
    InsufficientAuthentication = 0x05,
    /// The request is not supported by the server.
    RequestNotSupported = 0x06,
    /// Offset specified was past the end of the attribute.
    InvalidOffset = 0x07,
    /// Authorization is required before the attribute can be accessed.
    InsufficientAuthorization = 0x08,
    /// Too many prepare writes have been queued.
    PrepareQueueFull = 0x09,
    /// No attribute found within the given attribute handle range.
    AttributeNotFound = 0x0A,
    /// The attribute cannot be read using a blob request.
    AttributeNotLong = 0x0B,
    /// The encryption key size used for this link is too short.
    EncryptionKeySizeTooShort = 0x0C,
    /// The attribute value length is invalid for the operation.
    InvalidAttributeValueLength = 0x0D,
    /// The request encountered an unlikely error and could not be completed.
    UnlikelyError = 0x0E,
    /// Encryption is required before the attribute can be accessed.
    InsufficientEncryption = 0x0F,
    /// The attribute type is not a supported grouping attribute.
    UnsupportedGroupType = 0x10,
    /// Insufficient resources to complete the request.
    InsufficientResources = 0x11,
    /// The client must rediscover the database.
    DatabaseOutOfSync = 0x12,
    /// The attribute parameter value was not allowed.
    ValueNotAllowed = 0x13,
    /// Write cannot be fulfilled for reasons other than permissions.
    WriteRequestRejected = 0xFC,
    /// Client Characteristic Configuration descriptor is not configured as the
    /// profile requires.
    CccdImproperlyConfigured = 0xFD,
    /// A previously triggered operation is still in progress.
    ProcedureAlreadyInProgress = 0xFE,
    /// Attribute value is out of range.
    OutOfRange = 0xFF,
}

crate::impl_display_via_debug! { ErrorCode }
