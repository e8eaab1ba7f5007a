// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Core types for the beacon analytics tracker.
//!
//! This crate holds the pieces of the tracker that carry algorithmic
//! content and no I/O: the property map merged into every event, the
//! base64 wire payload, and the entropy-mixing distinct ID generator.
//! The tracker itself, persistence backends and transports live in the
//! `beacon-analytics` crate.

pub mod event;
pub mod identity;
pub mod properties;

pub use event::{EventPayload, PayloadError};
pub use identity::{EntropyIdGenerator, IdGenerator};
pub use properties::{Properties, RESERVED_PREFIX};
