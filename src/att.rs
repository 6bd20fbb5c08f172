//! Attribute Protocol ([Vol 3] Part F) types used by the GATT server runtime.

pub use {consts::*, handle::*};

mod consts;
mod handle;
