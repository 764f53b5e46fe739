//! Appeal lifecycle, access rules and reporting for the citizen appeals service.
//!
//! The services here sit between the HTTP layer and the stores in
//! `appeals-db`. They own validation, the role matrix, classifier-driven
//! routing, notification fan-out and the dashboard rollups.

pub mod services;

pub use services::*;
