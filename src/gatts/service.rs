use tracing::debug;

use crate::att::{Handle, HandleAlloc, HandleRange};
use crate::Uuid;

use super::*;

/// Service and its characteristics in registration order.
#[derive(Debug)]
pub struct Service {
    uuid: Uuid,
    typ: ServiceType,
    range: HandleRange,
    chars: Vec<Characteristic>,
}

impl Service {
    /// Creates an empty service declared at handle `hdl`.
    pub(super) fn new(uuid: Uuid, typ: ServiceType, hdl: Handle) -> Self {
        Self {
            uuid,
            typ,
            range: HandleRange::new(hdl, hdl),
            chars: Vec::new(),
        }
    }

    /// Returns the service declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.range.start()
    }

    /// Returns the service UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the service type.
    #[inline(always)]
    #[must_use]
    pub const fn typ(&self) -> ServiceType {
        self.typ
    }

    /// Returns the handle range from the service declaration to the last
    /// attribute of the last characteristic.
    #[inline(always)]
    pub const fn handle_range(&self) -> HandleRange {
        self.range
    }

    /// Returns the characteristics in registration order.
    #[inline(always)]
    #[must_use]
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.chars
    }

    #[inline(always)]
    pub(super) fn chars_mut(&mut self) -> &mut [Characteristic] {
        &mut self.chars
    }

    /// Allocates the characteristic handles, extends the service handle range,
    /// and appends the characteristic. No handles are consumed on error.
    pub(super) fn add_characteristic(
        &mut self,
        alloc: &mut HandleAlloc,
        uuid: Uuid,
        spec: CharSpec,
        init: &[u8],
    ) -> Result<&mut Characteristic> {
        spec.validate(init)?;
        let r = (alloc.alloc(spec.handle_count())).ok_or(RegistrationError::HandlesExhausted)?;
        let hdls = CharHandles {
            decl: r.start(),
            value: (r.start().next()).ok_or(RegistrationError::HandlesExhausted)?,
            cccd: (spec.handle_count() == 3).then_some(r.end()),
        };
        let c = Characteristic::new(uuid, spec, hdls, init)?;
        self.range = self.range.with_end(hdls.last());
        debug!("Added characteristic {uuid} at {hdls:?} to service {}", self.uuid);
        self.chars.push(c);
        let i = self.chars.len() - 1;
        Ok(&mut self.chars[i])
    }
}
