use std::fmt::{Debug, Display, Formatter};

use crate::att::{ErrorCode, Handle};

use super::*;

/// Interface to the controller driver that stores attribute values and
/// exchanges PDUs with the client.
///
/// Every method is a synchronous round-trip. Implementations must not call
/// back into the database.
pub trait Driver {
    /// Pushes a new value into the controller's attribute store.
    fn value_set(&mut self, hdl: Handle, val: &[u8]) -> std::result::Result<(), DriverError>;

    /// Answers a read or write authorization request. Exactly one reply is sent
    /// for every authorization request that the database handles.
    fn authorize_reply(
        &mut self,
        conn: ConnHandle,
        rsp: &AuthReply<'_>,
    ) -> std::result::Result<(), DriverError>;

    /// Sends a notification or indication.
    fn hvx(&mut self, conn: ConnHandle, hvx: &Hvx<'_>) -> std::result::Result<(), DriverError>;
}

/// Error code reported by a failed driver call.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("driver call failed with code {0:#06X}")]
pub struct DriverError(pub u32);

/// Connection handle assigned by the controller.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConnHandle(pub u16);

impl Debug for ConnHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", crate::name_of!(ConnHandle), self.0)
    }
}

impl Display for ConnHandle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Driver event delivered to [`Db::handle_event`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum Event<'a> {
    /// A peer connected.
    Connected { conn: ConnHandle },
    /// The peer disconnected.
    Disconnected { conn: ConnHandle, reason: u8 },
    /// The controller accepted a write without authorization and already
    /// applied it to its attribute store.
    Write {
        conn: ConnHandle,
        hdl: Handle,
        off: u16,
        data: &'a [u8],
    },
    /// The client wants to read an attribute that requires authorization.
    ReadAuthorize {
        conn: ConnHandle,
        hdl: Handle,
        off: u16,
    },
    /// The client wants to write an attribute that requires authorization, or
    /// is executing or cancelling its queued writes.
    WriteAuthorize { conn: ConnHandle, req: WriteAuth<'a> },
}

/// Write authorization request parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteAuth<'a> {
    /// Target attribute. This is `None` for execute/cancel requests, which are
    /// not scoped to any attribute.
    pub hdl: Option<Handle>,
    pub op: WriteOp,
    pub off: u16,
    pub data: &'a [u8],
}

impl<'a> WriteAuth<'a> {
    /// Creates a write authorization request for a single attribute.
    #[inline]
    #[must_use]
    pub const fn new(hdl: Handle, op: WriteOp, off: u16, data: &'a [u8]) -> Self {
        Self {
            hdl: Some(hdl),
            op,
            off,
            data,
        }
    }

    /// Creates an execute-now request for all queued writes.
    #[inline]
    #[must_use]
    pub const fn exec() -> Self {
        Self {
            hdl: None,
            op: WriteOp::ExecWriteNow,
            off: 0,
            data: &[],
        }
    }

    /// Creates a request that cancels all queued writes.
    #[inline]
    #[must_use]
    pub const fn cancel() -> Self {
        Self {
            hdl: None,
            op: WriteOp::ExecWriteCancel,
            off: 0,
            data: &[],
        }
    }
}

/// Authorization request type being answered.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AuthKind {
    Read,
    Write,
}

/// Authorization reply status.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    Success,
    Att(ErrorCode),
}

impl Status {
    /// Returns whether the request was accepted.
    #[inline(always)]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the 16-bit GATT status code: `0x0000` for success and
    /// `0x0100 | code` for ATT errors.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u16 {
        match self {
            Self::Success => 0x0000,
            Self::Att(e) => 0x0100 | u16::from(u8::from(e)),
        }
    }
}

impl From<ErrorCode> for Status {
    #[inline(always)]
    fn from(e: ErrorCode) -> Self {
        Self::Att(e)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Success => f.write_str("Success"),
            Self::Att(e) => Display::fmt(&e, f),
        }
    }
}

/// Authorization reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AuthReply<'a> {
    pub kind: AuthKind,
    pub status: Status,
    /// Whether the controller should apply `data` at `off` to its attribute
    /// store.
    pub update: bool,
    pub off: u16,
    pub data: Option<&'a [u8]>,
}

impl<'a> AuthReply<'a> {
    /// Creates a read authorization reply. The controller serves the value
    /// from its own store.
    #[inline]
    pub(super) const fn read(status: Status, off: u16) -> Self {
        Self {
            kind: AuthKind::Read,
            status,
            update: false,
            off,
            data: None,
        }
    }

    /// Creates a reply to a scoped write request. Accepted writes are applied
    /// to the controller's store as part of the reply.
    #[inline]
    pub(super) const fn write(status: Status, req: &WriteAuth<'a>) -> Self {
        Self {
            kind: AuthKind::Write,
            status,
            update: status.is_success(),
            off: req.off,
            data: Some(req.data),
        }
    }

    /// Creates the single reply to an execute/cancel request.
    #[inline]
    pub(super) const fn exec(status: Status) -> Self {
        Self {
            kind: AuthKind::Write,
            status,
            update: false,
            off: 0,
            data: None,
        }
    }
}

/// Notification or indication parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hvx<'a> {
    /// Characteristic value handle.
    pub hdl: Handle,
    pub kind: HvxKind,
    pub data: &'a [u8],
}
