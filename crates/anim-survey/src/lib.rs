//! Core library for the animation-image evaluation survey service.
//!
//! The crate is split along the survey lifecycle: `manifest` reads provider
//! run manifests from disk, `pools` assembles the rateable item pools,
//! `session` samples per-rater plans, `interaction` models the in-page rating
//! behaviors (rank assignment, submission gating, presentation helpers),
//! `responses` validates and persists submitted ratings, and `report`
//! aggregates everything for the study dashboard.

pub mod config;
pub mod error;
pub mod interaction;
pub mod manifest;
pub mod pools;
pub mod report;
pub mod responses;
pub mod session;
pub mod telemetry;
