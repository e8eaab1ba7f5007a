// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Server-side analytics event tracker.
//!
//! This crate tracks analytics events from backend request handlers: one
//! [`Tracker`] per inbound request, identity and super properties persisted
//! in a cookie shared with the companion browser-side client, events
//! dispatched synchronously as base64-encoded JSON over HTTP.
//!
//! # Features
//!
//! - **Explicit Request Context**: no ambient globals; the host hands the
//!   tracker a [`RequestContext`] snapshot of the inbound request
//! - **Cookie-backed State**: distinct ID and super properties survive
//!   across requests, readable by the browser-side client too
//! - **Anonymous Identity**: visitors without an ID get a generated one,
//!   stable for the rest of their session
//! - **Soft Failure**: a tracking problem never breaks the host request;
//!   every call returns a [`Dispatch`] outcome instead of erroring
//!
//! # Example
//!
//! ```no_run
//! use beacon_analytics::{Properties, RequestContext, Tracker};
//!
//! // Build the context from the inbound request.
//! let context = RequestContext::new()
//!     .with_remote_addr("203.0.113.7")
//!     .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0")
//!     .with_host("shop.example.com")
//!     .with_path_and_query("/checkout?step=2");
//!
//! let mut tracker = Tracker::with_token("my-project-token", context);
//!
//! // Known user: tie events to their ID and remember their plan.
//! tracker.identify("user-42");
//! tracker.register(Properties::new().insert("plan", "pro"));
//!
//! tracker.track("purchase", Properties::new().insert("amount", 99.5));
//! tracker.track_page_view(None);
//!
//! // Flush queued Set-Cookie headers into the response.
//! for header in tracker.storage().pending_headers() {
//!     println!("{header}");
//! }
//! ```

pub mod agent;
pub mod context;
pub mod cookie;
pub mod error;
pub mod referrer;
pub mod storage;
pub mod tracker;
pub mod transport;

pub use context::RequestContext;
pub use cookie::CookieBackend;
pub use error::{AnalyticsError, Result};
pub use referrer::{SearchEngine, DIRECT_REFERRER};
pub use storage::{MemoryBackend, NullBackend, StateStore, StorageBackend};
pub use tracker::{Dispatch, SkipReason, Tracker, TrackerConfig};
pub use transport::{HttpTransport, Transport, TransportChain, TransportResult};

// Re-export core types for convenience
pub use beacon_analytics_core::{
	EntropyIdGenerator, EventPayload, IdGenerator, PayloadError, Properties,
};
