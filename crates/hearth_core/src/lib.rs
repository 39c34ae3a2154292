//! Hearth Core - diagnostic engine for smart-home devices
//!
//! Given a device and a window of its recent event history, this crate
//! detects behavioral patterns (connectivity loss, automation-driven
//! state churn, event bursts, battery degradation) and synthesizes
//! evidence-backed remediation recommendations.
//!
//! The crate consumes three collaborator interfaces (event history,
//! device health, automation rule index) behind traits, runs its
//! detection algorithms concurrently with per-algorithm deadlines, and
//! always degrades to an annotated partial report instead of cascading a
//! single failure.

pub mod cache;
pub mod collaborators;
pub mod detector;
pub mod orchestrator;
pub mod recommender;

pub use cache::ResultCache;
pub use collaborators::{retry_with_backoff, AutomationIndex, DeviceHealth, EventStore, RetryPolicy};
pub use detector::{DetectorInput, DetectorOutcome, PatternDetector};
pub use orchestrator::DiagnosticEngine;
pub use recommender::{synthesize, SynthInput};
