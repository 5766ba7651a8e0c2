// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-protocol
//!
//! The request envelope dispatcher (`spec.md` §4.4, component C7): decodes a
//! transport payload into a [`capreg_core::RequestEnvelope`], binds a
//! deadline, routes by `method` to one of [`capreg_registry::RegistryCore`]'s
//! operations, and encodes the result into a
//! [`capreg_core::ResponseEnvelope`]. Grounded on the teacher's
//! `abp-protocol::router` (method-name dispatch table) and
//! `abp-protocol::codec` (envelope (de)serialization), generalized from the
//! teacher's fixed job-submission shape to this registry's nine named
//! operations.

/// Per-request deadline computation.
pub mod deadline;
/// The method-routing dispatcher.
pub mod dispatcher;
/// Transport-level payload size validation.
pub mod validate;

pub use dispatcher::{decode_envelope, Dispatcher};
