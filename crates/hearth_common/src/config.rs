//! Diagnostics configuration
//!
//! Every numeric threshold the detectors and the orchestrator use lives
//! here as a behavioral default, not a constant buried in an algorithm.
//! Hosts deserialize this from wherever they keep configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for one diagnostics core instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Thresholds for the pattern detection algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Gap between consecutive events that counts as a connectivity gap
    /// at all (seconds)
    pub gap_medium_secs: u64,
    /// Gap that escalates to high severity (seconds)
    pub gap_high_secs: u64,
    /// Gap that escalates to critical severity (seconds)
    pub gap_critical_secs: u64,
    /// Baseline confidence for connectivity gaps; an absence of events is
    /// directly observable, not inferred
    pub gap_confidence: f64,

    /// A toggle faster than this after the opposite state reads as
    /// automation-driven (seconds)
    pub fast_toggle_secs: u64,
    /// Toggles between fast and this bound are still suspicious (seconds)
    pub slow_toggle_secs: u64,
    /// Confidence for sub-`fast_toggle_secs` toggles
    pub fast_toggle_confidence: f64,
    /// Confidence for toggles in the fast..slow band
    pub slow_toggle_confidence: f64,
    /// Confidence for the explicit automation signature (rule/scheduler
    /// re-trigger, quiet-hours clustering)
    pub automation_signature_confidence: f64,
    /// Hour band (UTC, start inclusive, end exclusive) in which clustered
    /// activity is unusual
    pub quiet_hours_start: u32,
    pub quiet_hours_end: u32,
    /// State changes inside the quiet band needed to flag clustering
    pub quiet_hours_min_events: usize,

    /// Same-capability failures within the window needed to flag repeats
    pub repeated_failure_min: usize,
    /// Rolling window for repeated failures (seconds)
    pub failure_window_secs: u64,
    /// Confidence for repeated-failure findings
    pub repeated_failure_confidence: f64,
    /// Events within the storm window needed to flag an event storm
    pub storm_min_events: usize,
    /// Rolling window for storm density (seconds)
    pub storm_window_secs: u64,
    /// Confidence for event-storm findings
    pub storm_confidence: f64,

    /// Battery percentage below which the device is flagged
    pub battery_low: u8,
    /// Battery percentage below which severity escalates to high
    pub battery_very_low: u8,
    /// Battery percentage below which severity is critical
    pub battery_critical: u8,
    /// Confidence for battery-level findings
    pub battery_confidence: f64,
    /// Decline rate that flags accelerated battery drain (points/hour)
    pub battery_decline_per_hour: f64,
    /// Confidence for accelerated-decline findings; kept above
    /// `battery_confidence` so the merge prefers the decline instance
    /// when both fire
    pub battery_decline_confidence: f64,

    /// Soft deadline per detection algorithm (milliseconds)
    pub algorithm_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            gap_medium_secs: 3600,    // 1 hour
            gap_high_secs: 21600,     // 6 hours
            gap_critical_secs: 86400, // 24 hours
            gap_confidence: 0.8,
            fast_toggle_secs: 5,
            slow_toggle_secs: 10,
            fast_toggle_confidence: 0.95,
            slow_toggle_confidence: 0.85,
            automation_signature_confidence: 0.98,
            quiet_hours_start: 1,
            quiet_hours_end: 5,
            quiet_hours_min_events: 3,
            repeated_failure_min: 3,
            failure_window_secs: 300, // 5 minutes
            repeated_failure_confidence: 0.9,
            storm_min_events: 20,
            storm_window_secs: 60,
            storm_confidence: 0.75,
            battery_low: 20,
            battery_very_low: 15,
            battery_critical: 10,
            battery_confidence: 0.9,
            battery_decline_per_hour: 5.0,
            battery_decline_confidence: 0.92,
            algorithm_timeout_ms: 2000,
        }
    }
}

impl DetectorConfig {
    pub fn algorithm_timeout(&self) -> Duration {
        Duration::from_millis(self.algorithm_timeout_ms)
    }
}

/// Pipeline-level settings for the diagnostic orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Events fetched when the request does not name a window size
    pub default_window_size: usize,
    /// Soft deadline per context fetch (milliseconds)
    pub context_timeout_ms: u64,
    /// Overall budget for one pass after validation (milliseconds)
    pub overall_budget_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_window_size: 200,
            context_timeout_ms: 5000,  // 5 seconds
            overall_budget_ms: 15000,  // 15 seconds
        }
    }
}

impl OrchestratorConfig {
    pub fn context_timeout(&self) -> Duration {
        Duration::from_millis(self.context_timeout_ms)
    }

    pub fn overall_budget(&self) -> Duration {
        Duration::from_millis(self.overall_budget_ms)
    }
}

/// Settings for the single-flight result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime (seconds)
    pub ttl_secs: u64,
    /// Entry count bound; least recently used entries are dropped past it
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 60,
            max_entries: 256,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Static manufacturer to companion-app mapping.
///
/// Proprietary automations configured in these apps are invisible to the
/// platform's own rule index, so the synthesizer points users there first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionAppTable {
    /// Lowercase manufacturer fragment to app name
    entries: Vec<(String, String)>,
}

impl Default for CompanionAppTable {
    fn default() -> Self {
        let entries = [
            ("philips", "Philips Hue"),
            ("signify", "Philips Hue"),
            ("aqara", "Aqara Home"),
            ("lumi", "Aqara Home"),
            ("samsung", "SmartThings"),
            ("smartthings", "SmartThings"),
            ("tuya", "Smart Life"),
            ("ikea", "IKEA Home smart"),
            ("sonoff", "eWeLink"),
            ("itead", "eWeLink"),
            ("shelly", "Shelly Smart Control"),
            ("tp-link", "Kasa"),
            ("kasa", "Kasa"),
        ]
        .into_iter()
        .map(|(m, a)| (m.to_string(), a.to_string()))
        .collect();
        Self { entries }
    }
}

impl CompanionAppTable {
    /// Look up the companion app for a manufacturer, matching on a
    /// case-insensitive fragment.
    pub fn lookup(&self, manufacturer: &str) -> Option<&str> {
        let needle = manufacturer.to_lowercase();
        self.entries
            .iter()
            .find(|(fragment, _)| needle.contains(fragment.as_str()))
            .map(|(_, app)| app.as_str())
    }
}
