//! GATT server attribute database runtime ([Vol 3] Part G).
//!
//! The [`Db`] owns every [`Service`] and [`Characteristic`], allocates their
//! attribute handles, and routes driver events to the characteristic that
//! owns the target handle. Each characteristic composes a value store, a
//! subscription tracker, and a prepared-write queue.

use std::convert::Infallible;

pub use {characteristic::*, config::*, consts::*, db::*, driver::*, service::*, sub::*};

use crate::att::Handle;
use crate::{Uuid, UuidError};

mod characteristic;
mod config;
mod consts;
mod db;
mod driver;
mod queue;
mod service;
mod sub;
mod value;

#[cfg(test)]
mod tests;

/// Error type returned by the GATT server runtime.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("value length {len} exceeds maximum length {max}")]
    ValueTooLong { len: usize, max: usize },
    #[error("characteristic {0} does not support notifications or indications")]
    NotNotifiable(Uuid),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("no characteristic owns {0}")]
    InvalidHandle(Handle),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl From<UuidError> for Error {
    #[inline]
    fn from(e: UuidError) -> Self {
        Self::Registration(RegistrationError::InvalidUuid(e))
    }
}

impl From<Infallible> for Error {
    #[inline]
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Database setup failure.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistrationError {
    #[error("attribute handles exhausted")]
    HandlesExhausted,
    #[error("invalid maximum value length {0} (must be 1..=512)")]
    InvalidMaxLen(usize),
    #[error("service {0} is closed to new characteristics")]
    ServiceClosed(Handle),
    #[error("unknown service {0}")]
    UnknownService(Handle),
    #[error(transparent)]
    InvalidUuid(#[from] UuidError),
}

/// Common GATT server result type.
pub type Result<T> = std::result::Result<T, Error>;
