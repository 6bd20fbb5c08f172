//! Blackrock User-Mode Bluetooth LE library: GATT server runtime.
//!
//! Tracks characteristic values of a peripheral's attribute database, mediates
//! client reads and writes through the controller's authorization handshake,
//! reassembles prepared (queued) writes, and drives notifications and
//! indications as clients change their subscriptions.
//!
//! The radio/driver transport is supplied by the application through the
//! [`gatts::Driver`] trait. All events arrive through
//! [`gatts::Db::handle_event`] and are processed synchronously, one at a time.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_crate_dependencies)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::cargo)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::assertions_on_result_states)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::empty_structs_with_brackets)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::if_then_some_else_none)]
#![warn(clippy::mod_module_files)]
#![warn(clippy::print_stdout)]
#![warn(clippy::str_to_string)]
#![warn(clippy::string_to_string)]
#![warn(clippy::todo)]
#![warn(clippy::try_err)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::unseparated_literal_suffix)]

pub use uuid::*;
pub(crate) use util::*;

pub mod att;
pub mod gatts;
mod util;
mod uuid;

// Dev-dependencies used only by the demo binary.
#[cfg(test)]
use {anyhow as _, clap as _, tracing_subscriber as _};
