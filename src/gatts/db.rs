use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use tracing::{debug, info, trace, warn};

use crate::att::{Handle, HandleAlloc};
use crate::Uuid;

use super::*;

/// GATT server attribute database.
///
/// Services and characteristics are registered once during setup. Only the
/// last added service accepts new characteristics. After setup, driver events
/// are passed to [`Db::handle_event`] one at a time.
pub struct Db<D> {
    drv: D,
    cfg: Config,
    alloc: HandleAlloc,
    conn: Option<ConnHandle>,
    svcs: Vec<Service>,
    /// Map of value and CCCD handles to (service, characteristic) indices.
    idx: BTreeMap<Handle, (usize, usize)>,
}

impl<D: Driver> Db<D> {
    /// Creates an empty database with the default configuration.
    #[inline]
    #[must_use]
    pub fn new(drv: D) -> Self {
        Self::with_config(drv, Config::default())
    }

    /// Creates an empty database.
    #[must_use]
    pub fn with_config(drv: D, cfg: Config) -> Self {
        Self {
            drv,
            cfg,
            alloc: HandleAlloc::new(),
            conn: None,
            svcs: Vec::new(),
            idx: BTreeMap::new(),
        }
    }

    /// Returns the driver.
    #[inline(always)]
    pub const fn driver(&self) -> &D {
        &self.drv
    }

    /// Returns the driver.
    #[inline(always)]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.drv
    }

    /// Returns the runtime configuration.
    #[inline(always)]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the connected peer.
    #[inline(always)]
    pub const fn connection(&self) -> Option<ConnHandle> {
        self.conn
    }

    /// Adds a service and returns its declaration handle. The previously added
    /// service is closed to new characteristics.
    pub fn add_service<U>(&mut self, uuid: U, typ: ServiceType) -> Result<Handle>
    where
        U: TryInto<Uuid>,
        Error: From<U::Error>,
    {
        let uuid = uuid.try_into()?;
        let r = (self.alloc.alloc(1)).ok_or(RegistrationError::HandlesExhausted)?;
        debug!("Added {typ} service {uuid} at {}", r.start());
        self.svcs.push(Service::new(uuid, typ, r.start()));
        Ok(r.start())
    }

    /// Adds a characteristic to the service declared at `svc`.
    pub fn add_characteristic<U>(
        &mut self,
        svc: Handle,
        uuid: U,
        spec: CharSpec,
        init: &[u8],
    ) -> Result<&mut Characteristic>
    where
        U: TryInto<Uuid>,
        Error: From<U::Error>,
    {
        let uuid = uuid.try_into()?;
        let si = match self.svcs.iter().position(|s| s.handle() == svc) {
            Some(i) if i + 1 == self.svcs.len() => i,
            Some(_) => return Err(RegistrationError::ServiceClosed(svc).into()),
            None => return Err(RegistrationError::UnknownService(svc).into()),
        };
        let s = &mut self.svcs[si];
        let ci = s.characteristics().len();
        let c = s.add_characteristic(&mut self.alloc, uuid, spec, init)?;
        self.idx.insert(c.value_handle(), (si, ci));
        if let Some(h) = c.cccd_handle() {
            self.idx.insert(h, (si, ci));
        }
        Ok(c)
    }

    /// Returns the services in registration order.
    #[inline(always)]
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.svcs
    }

    /// Returns all characteristics in handle order.
    pub fn characteristics(&self) -> impl Iterator<Item = &Characteristic> {
        self.svcs.iter().flat_map(Service::characteristics)
    }

    /// Returns the characteristic that owns the value or CCCD handle `hdl`.
    #[must_use]
    pub fn characteristic(&self, hdl: Handle) -> Option<&Characteristic> {
        let &(si, ci) = self.idx.get(&hdl)?;
        Some(&self.svcs[si].characteristics()[ci])
    }

    /// Returns the characteristic that owns the value or CCCD handle `hdl`.
    #[must_use]
    pub fn characteristic_mut(&mut self, hdl: Handle) -> Option<&mut Characteristic> {
        let &(si, ci) = self.idx.get(&hdl)?;
        Some(&mut self.svcs[si].chars_mut()[ci])
    }

    /// Sets the value of the characteristic with value handle `hdl` and
    /// optionally notifies or indicates the new value to a subscribed client.
    pub fn set_value(&mut self, hdl: Handle, v: &[u8], notify: bool) -> Result<()> {
        let &(si, ci) = self.idx.get(&hdl).ok_or(Error::InvalidHandle(hdl))?;
        let c = &mut self.svcs[si].chars_mut()[ci];
        if c.value_handle() != hdl {
            return Err(Error::InvalidHandle(hdl));
        }
        c.set_value(&mut self.drv, self.conn, v, notify)
    }

    /// Handles a driver event. Events for handles that are not owned by any
    /// characteristic are ignored.
    pub fn handle_event(&mut self, evt: Event<'_>) -> Result<()> {
        match evt {
            Event::Connected { conn } => {
                if let Some(old) = self.conn.replace(conn) {
                    warn!("{conn} replaces {old} without a disconnect");
                    for c in self.svcs.iter_mut().flat_map(Service::chars_mut) {
                        c.handle_disconnect();
                    }
                }
                info!("Connected: {conn}");
            }
            Event::Disconnected { conn, reason } => {
                if self.conn != Some(conn) {
                    warn!("Disconnect of unknown {conn}");
                    return Ok(());
                }
                info!("Disconnected: {conn} (reason {reason:#04X})");
                self.conn = None;
                for c in self.svcs.iter_mut().flat_map(Service::chars_mut) {
                    c.handle_disconnect();
                }
            }
            Event::Write {
                conn,
                hdl,
                off,
                data,
            } => {
                let Some(&(si, ci)) = self.idx.get(&hdl) else {
                    trace!("Ignoring write to {hdl}");
                    return Ok(());
                };
                trace!("Write from {conn} to {hdl} at offset {off}");
                let c = &mut self.svcs[si].chars_mut()[ci];
                c.handle_write(&mut self.drv, conn, hdl, data, self.cfg.prefer_indications);
            }
            Event::ReadAuthorize { conn, hdl, off } => {
                if !self.is_connected(conn) {
                    return Ok(());
                }
                let Some(&(si, ci)) = self.idx.get(&hdl) else {
                    warn!("Read authorization for unknown {hdl}");
                    return Ok(());
                };
                let c = &mut self.svcs[si].chars_mut()[ci];
                return c.handle_read_auth(&mut self.drv, &self.cfg, conn, hdl, off);
            }
            Event::WriteAuthorize { conn, req } => {
                return self.dispatch_write_authorization(conn, &req);
            }
        }
        Ok(())
    }

    /// Handles a write authorization request. Execute/cancel requests are
    /// applied to every characteristic with an open prepared write transaction
    /// and answered with a single reply. Other requests are routed to the
    /// characteristic that owns the target handle.
    pub fn dispatch_write_authorization(
        &mut self,
        conn: ConnHandle,
        req: &WriteAuth<'_>,
    ) -> Result<()> {
        if !self.is_connected(conn) {
            return Ok(());
        }
        if req.op.is_exec() {
            return self.exec_queued(conn, req.op == WriteOp::ExecWriteNow);
        }
        let Some(hdl) = req.hdl else {
            warn!("{} without a handle", req.op);
            return Ok(());
        };
        let Some(&(si, ci)) = self.idx.get(&hdl) else {
            warn!("Write authorization for unknown {hdl}");
            return Ok(());
        };
        let c = &mut self.svcs[si].chars_mut()[ci];
        c.handle_write_auth(&mut self.drv, &self.cfg, conn, hdl, req)
    }

    /// Logs the database contents.
    pub fn dump(&self) {
        info!("GATT server database:");
        for s in &self.svcs {
            let r = s.handle_range();
            let sec = (s.typ() == ServiceType::Secondary)
                .then_some("(Secondary) ")
                .unwrap_or_default();
            info!(
                "[{:#06X}..={:#06X}] {sec}Service <{}>",
                u16::from(r.start()),
                u16::from(r.end()),
                s.uuid()
            );
            for c in s.characteristics() {
                let h = c.handles();
                info!(
                    "[{:#06X}] |__ Characteristic <{}> {:?}",
                    u16::from(h.decl),
                    c.uuid(),
                    c.props()
                );
                info!(
                    "[{:#06X}] |   |__ Value ({}/{} bytes)",
                    u16::from(h.value),
                    c.value().len(),
                    c.max_len()
                );
                if let Some(cccd) = h.cccd {
                    info!(
                        "[{:#06X}] |   |__ CCCD ({})",
                        u16::from(cccd),
                        c.subscription()
                    );
                }
            }
        }
    }

    /// Returns whether `conn` is the connected peer.
    fn is_connected(&self, conn: ConnHandle) -> bool {
        if self.conn == Some(conn) {
            return true;
        }
        warn!("Authorization request from unknown {conn}");
        false
    }

    /// Executes or cancels all open prepared write transactions. The reply is
    /// sent before any transaction is committed or discarded.
    fn exec_queued(&mut self, conn: ConnHandle, commit: bool) -> Result<()> {
        let mut st = Status::Success;
        if commit && self.cfg.strict_prepared_writes {
            let err = (self.characteristics())
                .filter(|c| c.has_pending_write())
                .find_map(|c| c.validate_queue().err());
            if let Some(e) = err {
                warn!("Rejecting queued writes: {e}");
                st = e.into();
            }
        }
        let r = self.drv.authorize_reply(conn, &AuthReply::exec(st));
        self.cfg.reply_failure.check(r)?;
        let commit = commit && st.is_success();
        let mut first = Ok(());
        for c in self.svcs.iter_mut().flat_map(Service::chars_mut) {
            let r = c.exec_queued(&mut self.drv, conn, commit);
            if first.is_ok() {
                first = r;
            }
        }
        first
    }
}

impl<D> Debug for Db<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("cfg", &self.cfg)
            .field("conn", &self.conn)
            .field("svcs", &self.svcs)
            .finish_non_exhaustive()
    }
}
