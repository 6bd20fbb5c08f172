use std::fmt::{Debug, Formatter};

use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::att::{ErrorCode, Handle, MAX_VAL_LEN};
use crate::{name_of, Uuid};

use super::queue::WriteQueue;
use super::value::Value;
use super::*;

/// CCCD value length.
const CCCD_LEN: usize = std::mem::size_of::<u16>();

/// Characteristic definition used at registration.
///
/// ```
/// # use burble_gatts::gatts::{CharProps, CharSpec, SecurityLevel};
/// const HRM: CharSpec = CharSpec::new(CharProps::NOTIFY)
///     .max_len(8)
///     .read_security(SecurityLevel::JustWorks);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub struct CharSpec {
    props: CharProps,
    max_len: usize,
    var_len: bool,
    read_sec: SecurityLevel,
    write_sec: SecurityLevel,
}

impl CharSpec {
    /// Creates a definition of a variable-length characteristic of up to
    /// 20 bytes with open access.
    #[inline]
    pub const fn new(props: CharProps) -> Self {
        Self {
            props,
            max_len: 20,
            var_len: true,
            read_sec: SecurityLevel::Open,
            write_sec: SecurityLevel::Open,
        }
    }

    /// Sets the maximum length of a variable-length value.
    #[inline]
    pub const fn max_len(self, n: usize) -> Self {
        Self {
            max_len: n,
            var_len: true,
            ..self
        }
    }

    /// Sets the length of a fixed-length value.
    #[inline]
    pub const fn fixed_len(self, n: usize) -> Self {
        Self {
            max_len: n,
            var_len: false,
            ..self
        }
    }

    /// Sets the security level for both reads and writes.
    #[inline]
    pub const fn security(self, s: SecurityLevel) -> Self {
        Self {
            read_sec: s,
            write_sec: s,
            ..self
        }
    }

    /// Sets the security level for reads.
    #[inline]
    pub const fn read_security(self, s: SecurityLevel) -> Self {
        Self {
            read_sec: s,
            ..self
        }
    }

    /// Sets the security level for writes.
    #[inline]
    pub const fn write_security(self, s: SecurityLevel) -> Self {
        Self {
            write_sec: s,
            ..self
        }
    }

    /// Returns the number of attribute handles used by the characteristic.
    #[inline]
    pub(super) const fn handle_count(&self) -> u16 {
        if self.props.is_notifiable() {
            3
        } else {
            2
        }
    }

    /// Returns an error if the maximum length is outside `1..=512` or the
    /// initial value does not fit.
    pub(super) fn validate(&self, init: &[u8]) -> Result<()> {
        if self.max_len == 0 || self.max_len > MAX_VAL_LEN {
            return Err(RegistrationError::InvalidMaxLen(self.max_len).into());
        }
        if init.len() > self.max_len {
            return Err(Error::ValueTooLong {
                len: init.len(),
                max: self.max_len,
            });
        }
        Ok(())
    }
}

/// Attribute handles of a characteristic.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CharHandles {
    /// Characteristic declaration.
    pub decl: Handle,
    /// Characteristic value.
    pub value: Handle,
    /// Client Characteristic Configuration descriptor.
    pub cccd: Option<Handle>,
}

impl CharHandles {
    /// Returns the last handle used by the characteristic.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Handle {
        self.cccd.unwrap_or(self.value)
    }
}

/// Read callback state. Notifications requested while the read callback is
/// active are suppressed because the pending read returns the new value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum ReadState {
    #[default]
    Idle,
    CallbackActive,
}

/// Characteristic state that is accessible from the read callback.
#[derive(Debug)]
struct Core {
    uuid: Uuid,
    spec: CharSpec,
    hdls: CharHandles,
    val: Value,
    sub: Subscription,
    read: ReadState,
}

impl Core {
    fn set_value(
        &mut self,
        drv: &mut dyn Driver,
        conn: Option<ConnHandle>,
        v: &[u8],
        notify: bool,
    ) -> Result<()> {
        self.val.check(v.len())?;
        if notify && !self.spec.props.is_notifiable() {
            return Err(Error::NotNotifiable(self.uuid));
        }
        drv.value_set(self.hdls.value, v)?;
        self.val.set(v);
        if !notify {
            return Ok(());
        }
        let (Some(conn), Some(kind)) = (conn, self.sub.state().hvx_kind()) else {
            return Ok(());
        };
        if self.read == ReadState::CallbackActive {
            trace!("Suppressing {kind} for {} during read", self.uuid);
            return Ok(());
        }
        let hvx = Hvx {
            hdl: self.hdls.value,
            kind,
            data: v,
        };
        Ok(drv.hvx(conn, &hvx)?)
    }
}

/// Read callback context. Notifications are suppressed while the context
/// exists, including when the callback unwinds.
pub struct ReadCtx<'a> {
    core: &'a mut Core,
    drv: &'a mut dyn Driver,
    conn: ConnHandle,
}

impl<'a> ReadCtx<'a> {
    fn new(core: &'a mut Core, drv: &'a mut dyn Driver, conn: ConnHandle) -> Self {
        core.read = ReadState::CallbackActive;
        Self { core, drv, conn }
    }
}

impl ReadCtx<'_> {
    /// Returns the connection of the client performing the read.
    #[inline(always)]
    #[must_use]
    pub const fn conn(&self) -> ConnHandle {
        self.conn
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.core.uuid
    }

    /// Returns the current value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.core.val.as_ref()
    }

    /// Updates the value before it is returned to the client. Notifications
    /// are never sent from the read callback.
    pub fn set_value(&mut self, v: &[u8], notify: bool) -> Result<()> {
        (self.core).set_value(&mut *self.drv, Some(self.conn), v, notify)
    }
}

impl Drop for ReadCtx<'_> {
    #[inline]
    fn drop(&mut self) {
        self.core.read = ReadState::Idle;
    }
}

impl Debug for ReadCtx<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCtx")
            .field("uuid", &self.core.uuid)
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

/// Write and subscription observer context.
pub struct WriteCtx<'a> {
    core: &'a mut Core,
    drv: &'a mut dyn Driver,
    conn: ConnHandle,
}

impl WriteCtx<'_> {
    /// Returns the connection of the client that performed the write.
    #[inline(always)]
    #[must_use]
    pub const fn conn(&self) -> ConnHandle {
        self.conn
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.core.uuid
    }

    /// Returns the current value. Observers called after one that changed the
    /// value see the changed value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.core.val.as_ref()
    }

    /// Returns the client subscription state.
    #[inline(always)]
    #[must_use]
    pub const fn subscription(&self) -> SubscriptionState {
        self.core.sub.state()
    }

    /// Sets a new value and optionally notifies or indicates it to the
    /// client.
    pub fn set_value(&mut self, v: &[u8], notify: bool) -> Result<()> {
        (self.core).set_value(&mut *self.drv, Some(self.conn), v, notify)
    }
}

impl Debug for WriteCtx<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCtx")
            .field("uuid", &self.core.uuid)
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

type WriteFn = Box<dyn FnMut(&mut WriteCtx<'_>)>;
type ReadFn = Box<dyn FnMut(&mut ReadCtx<'_>)>;
type SubFn = Box<dyn FnMut(&mut WriteCtx<'_>, SubscriptionState)>;

/// Characteristic observers. Write and subscription events may have any number
/// of observers. There is at most one read callback.
#[derive(Default)]
struct Events {
    write: SmallVec<[WriteFn; 1]>,
    read: Option<ReadFn>,
    sub: SmallVec<[SubFn; 1]>,
}

impl Events {
    fn write(&mut self, ctx: &mut WriteCtx<'_>) {
        for f in &mut self.write {
            f(ctx);
        }
    }

    fn sub(&mut self, ctx: &mut WriteCtx<'_>, s: SubscriptionState) {
        for f in &mut self.sub {
            f(ctx, s);
        }
    }
}

impl Debug for Events {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Events))
            .field("write", &self.write.len())
            .field("read", &self.read.is_some())
            .field("sub", &self.sub.len())
            .finish()
    }
}

/// Characteristic runtime.
#[derive(Debug)]
pub struct Characteristic {
    core: Core,
    queue: WriteQueue,
    events: Events,
}

impl Characteristic {
    /// Creates a characteristic with the initial value `init`.
    pub(super) fn new(uuid: Uuid, spec: CharSpec, hdls: CharHandles, init: &[u8]) -> Result<Self> {
        Ok(Self {
            core: Core {
                uuid,
                spec,
                hdls,
                val: Value::new(init, spec.max_len, spec.var_len)?,
                sub: Subscription::new(hdls.cccd),
                read: ReadState::Idle,
            },
            queue: WriteQueue::default(),
            events: Events::default(),
        })
    }

    /// Adds a write observer, which is called after a client write or an
    /// executed prepared write is applied. The observer may update and notify
    /// the value with [`WriteCtx::set_value`].
    pub fn on_write(&mut self, f: impl FnMut(&mut WriteCtx<'_>) + 'static) -> &mut Self {
        self.events.write.push(Box::new(f));
        self
    }

    /// Sets the read callback, replacing any previous one. The callback is
    /// called before the reply to a read that starts at offset 0, and may
    /// update the value with [`ReadCtx::set_value`].
    pub fn on_read(&mut self, f: impl FnMut(&mut ReadCtx<'_>) + 'static) -> &mut Self {
        self.events.read = Some(Box::new(f));
        self
    }

    /// Adds a subscription observer, which is called with the new state after
    /// every CCCD write.
    pub fn on_subscription_change(
        &mut self,
        f: impl FnMut(&mut WriteCtx<'_>, SubscriptionState) + 'static,
    ) -> &mut Self {
        self.events.sub.push(Box::new(f));
        self
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.core.uuid
    }

    /// Returns the characteristic properties.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> CharProps {
        self.core.spec.props
    }

    /// Returns the attribute handles.
    #[inline(always)]
    #[must_use]
    pub const fn handles(&self) -> CharHandles {
        self.core.hdls
    }

    /// Returns the value handle.
    #[inline(always)]
    #[must_use]
    pub const fn value_handle(&self) -> Handle {
        self.core.hdls.value
    }

    /// Returns the CCCD handle of a notifiable characteristic.
    #[inline(always)]
    #[must_use]
    pub const fn cccd_handle(&self) -> Option<Handle> {
        self.core.hdls.cccd
    }

    /// Returns the current value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.core.val.as_ref()
    }

    /// Returns the client subscription state.
    #[inline(always)]
    #[must_use]
    pub const fn subscription(&self) -> SubscriptionState {
        self.core.sub.state()
    }

    /// Returns whether the client is subscribed to value updates.
    #[inline(always)]
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.core.sub.state().is_subscribed()
    }

    /// Returns whether the characteristic supports notifications or
    /// indications.
    #[inline(always)]
    #[must_use]
    pub const fn is_notifiable(&self) -> bool {
        self.core.spec.props.is_notifiable()
    }

    /// Returns the maximum value length.
    #[inline(always)]
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.core.val.max_len()
    }

    /// Returns whether the value has variable length.
    #[inline(always)]
    #[must_use]
    pub const fn is_variable_len(&self) -> bool {
        self.core.val.is_variable_len()
    }

    /// Returns the security level required for reads.
    #[inline(always)]
    #[must_use]
    pub const fn read_security(&self) -> SecurityLevel {
        self.core.spec.read_sec
    }

    /// Returns the security level required for writes.
    #[inline(always)]
    #[must_use]
    pub const fn write_security(&self) -> SecurityLevel {
        self.core.spec.write_sec
    }

    /// Returns whether a prepared write transaction is open.
    #[inline(always)]
    #[must_use]
    pub const fn has_pending_write(&self) -> bool {
        self.queue.is_open()
    }

    /// Sets a new value and optionally notifies or indicates it to a
    /// subscribed client. Nothing is changed if an error is returned before
    /// the value is pushed to the driver. A failed notification is returned
    /// after the new value is stored.
    pub(super) fn set_value(
        &mut self,
        drv: &mut dyn Driver,
        conn: Option<ConnHandle>,
        v: &[u8],
        notify: bool,
    ) -> Result<()> {
        self.core.set_value(drv, conn, v, notify)
    }

    /// Applies a write that the controller has already accepted.
    pub(super) fn handle_write(
        &mut self,
        drv: &mut dyn Driver,
        conn: ConnHandle,
        hdl: Handle,
        v: &[u8],
        prefer_ind: bool,
    ) {
        if Some(hdl) == self.core.sub.handle() {
            let s = self.core.sub.write(v, prefer_ind);
            debug!("Subscription to {} changed to {s}", self.core.uuid);
            let core = &mut self.core;
            self.events.sub(&mut WriteCtx { core, drv, conn }, s);
        } else if hdl == self.core.hdls.value {
            if let Err(e) = self.core.val.check(v.len()) {
                warn!("Dropping write to {}: {e}", self.core.uuid);
                return;
            }
            self.core.val.set(v);
            let core = &mut self.core;
            self.events.write(&mut WriteCtx { core, drv, conn });
        }
    }

    /// Handles a read authorization request for a handle owned by this
    /// characteristic.
    pub(super) fn handle_read_auth(
        &mut self,
        drv: &mut dyn Driver,
        cfg: &Config,
        conn: ConnHandle,
        hdl: Handle,
        off: u16,
    ) -> Result<()> {
        let st = if hdl != self.core.hdls.value {
            Status::Success
        } else if usize::from(off) > self.core.val.len() {
            debug!("Read of {} at invalid offset {off}", self.core.uuid);
            ErrorCode::InvalidOffset.into()
        } else {
            if let (0, Some(f)) = (off, self.events.read.as_mut()) {
                f(&mut ReadCtx::new(&mut self.core, &mut *drv, conn));
            }
            Status::Success
        };
        (cfg.reply_failure).check(drv.authorize_reply(conn, &AuthReply::read(st, off)))
    }

    /// Handles a scoped write authorization request. The reply is sent before
    /// the write is queued or applied.
    pub(super) fn handle_write_auth(
        &mut self,
        drv: &mut dyn Driver,
        cfg: &Config,
        conn: ConnHandle,
        hdl: Handle,
        req: &WriteAuth<'_>,
    ) -> Result<()> {
        let is_cccd = Some(hdl) == self.core.sub.handle();
        let fits = if is_cccd {
            usize::from(req.off) + req.data.len() <= CCCD_LEN
        } else {
            self.core.val.fits(req.off, req.data.len())
        };
        let st: Status = if !fits {
            ErrorCode::InvalidAttributeValueLength.into()
        } else if is_cccd && req.op == WriteOp::PrepareWriteReq {
            ErrorCode::RequestNotSupported.into()
        } else {
            Status::Success
        };
        let r = drv.authorize_reply(conn, &AuthReply::write(st, req));
        if !st.is_success() {
            debug!("Rejected {} to {}: {st}", req.op, self.core.uuid);
            return cfg.reply_failure.check(r);
        }
        cfg.reply_failure.check(r)?;
        match req.op {
            WriteOp::PrepareWriteReq => {
                trace!(
                    "Queued {} bytes at offset {} for {}",
                    req.data.len(),
                    req.off,
                    self.core.uuid
                );
                self.queue.push(req.off, req.data);
            }
            WriteOp::WriteReq | WriteOp::WriteCmd | WriteOp::SignedWriteCmd => {
                self.handle_write(drv, conn, hdl, req.data, cfg.prefer_indications);
            }
            // Handled by the database
            WriteOp::ExecWriteCancel | WriteOp::ExecWriteNow => {}
        }
        Ok(())
    }

    /// Checks the queued chunks of an open transaction.
    pub(super) fn validate_queue(&self) -> std::result::Result<(), ErrorCode> {
        self.queue.validate(self.core.val.max_len())
    }

    /// Commits or discards an open prepared write transaction. A reassembled
    /// value that exceeds the maximum length is discarded.
    pub(super) fn exec_queued(
        &mut self,
        drv: &mut dyn Driver,
        conn: ConnHandle,
        commit: bool,
    ) -> Result<()> {
        let uuid = self.core.uuid;
        if !commit {
            if self.queue.clear() {
                info!("Cancelled queued write to {uuid}");
            }
            return Ok(());
        }
        let Some(v) = self.queue.take() else {
            return Ok(());
        };
        info!("Executing queued write to {uuid}");
        debug!("New value: {v:02X?}");
        if let Err(e) = self.core.val.check(v.len()) {
            warn!("Discarding queued write to {uuid}: {e}");
            return Ok(());
        }
        drv.value_set(self.core.hdls.value, &v)?;
        self.core.val.set(&v);
        let core = &mut self.core;
        self.events.write(&mut WriteCtx { core, drv, conn });
        Ok(())
    }

    /// Resets the subscription and discards any open transaction. No events are
    /// raised.
    pub(super) fn handle_disconnect(&mut self) {
        if self.core.sub.reset() {
            debug!("Subscription to {} reset", self.core.uuid);
        }
        if self.queue.clear() {
            debug!("Discarded queued write to {}", self.core.uuid);
        }
    }
}
