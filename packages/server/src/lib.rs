#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the hotspot map application.
//!
//! Loads one dataset into memory at startup and exposes each
//! analytical engine as a single call-and-return JSON endpoint. Every
//! request filters the working set, runs the engine to completion, and
//! returns the full recomputed result; nothing is cached between
//! calls.

pub mod handlers;

use hotspot_records_models::{CanonicalField, RecordSet};

/// Shared application state: the dataset loaded at startup.
pub struct AppState {
    /// The normalized working set.
    pub records: RecordSet,
    /// Canonical fields the dataset actually populates.
    pub fields: Vec<CanonicalField>,
}
