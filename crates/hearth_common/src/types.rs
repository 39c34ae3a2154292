//! Diagnostic data model
//!
//! Request-scoped value objects: everything here is created fresh for one
//! diagnostic pass and discarded once the report is returned. Field names
//! are a stable contract for downstream consumers (UI, chat layers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who caused an event to be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// The device itself reported a state change
    Device,
    /// A user acted through the companion app
    App,
    /// An automation rule fired
    Rule,
    /// A scheduled job fired
    Scheduler,
}

impl EventSource {
    /// True when the event was caused by automation rather than a person
    /// or the device's own state reporting.
    pub fn is_automated(&self) -> bool {
        matches!(self, EventSource::Rule | EventSource::Scheduler)
    }
}

/// One entry in a device's event history, as delivered by the event
/// collaborator. Ordering is significant and preserved as delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub device_id: String,
    /// Capability the event belongs to (e.g. "switch", "battery")
    pub capability: String,
    /// Attribute that changed (e.g. "switch", "level")
    pub attribute: String,
    /// New value as reported (e.g. "on", "off", "42")
    pub value: String,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
}

impl Event {
    /// Parse the value as a number, for attributes like battery level.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok()
    }
}

/// Read-only view of a device's current state as of request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub online: bool,
    /// Battery percentage 0-100, when the device reports one
    pub battery_level: Option<u8>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    /// Degraded stand-in used when the health collaborator could not be
    /// reached. Claims nothing beyond the id the caller supplied.
    pub fn placeholder(device_id: &str) -> Self {
        Self {
            id: device_id.to_string(),
            name: device_id.to_string(),
            manufacturer: None,
            online: true,
            battery_level: None,
            last_seen: None,
        }
    }
}

/// The part a device plays in an automation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRole {
    Trigger,
    Action,
}

impl std::fmt::Display for RuleRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleRole::Trigger => write!(f, "trigger"),
            RuleRole::Action => write!(f, "action"),
        }
    }
}

/// Association between an automation rule and a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRuleRef {
    pub rule_id: String,
    pub name: String,
    pub role: RuleRole,
    pub device_id: String,
}

/// Pattern categories the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    ConnectivityGap,
    RapidChanges,
    AutomationTrigger,
    EventAnomaly,
    BatteryDegradation,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PatternType::ConnectivityGap => "connectivity_gap",
            PatternType::RapidChanges => "rapid_changes",
            PatternType::AutomationTrigger => "automation_trigger",
            PatternType::EventAnomaly => "event_anomaly",
            PatternType::BatteryDegradation => "battery_degradation",
        };
        write!(f, "{}", s)
    }
}

/// Urgency tier derived from a finding's score.
///
/// Ordered so that `Critical` compares greatest; report sorting relies on
/// this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Time span covering the evidence that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvidenceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EvidenceWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// A single detected pattern instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFinding {
    pub device_id: String,
    pub pattern: PatternType,
    /// Probability-like estimate in [0, 1] that this finding correctly
    /// characterizes the underlying cause. Clamped at construction.
    pub confidence: f64,
    pub severity: Severity,
    /// Raw algorithm score; severity is a deterministic function of this
    /// against each algorithm's breakpoint table.
    pub score: f64,
    pub occurrences: usize,
    pub evidence_window: EvidenceWindow,
    /// One sentence of observed evidence, quoted verbatim by the
    /// recommendation synthesizer.
    pub summary: String,
}

impl PatternFinding {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: impl Into<String>,
        pattern: PatternType,
        confidence: f64,
        severity: Severity,
        score: f64,
        occurrences: usize,
        evidence_window: EvidenceWindow,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            pattern,
            confidence: confidence.clamp(0.0, 1.0),
            severity,
            score,
            occurrences,
            evidence_window,
            summary: summary.into(),
        }
    }
}

/// A prioritized, justified remediation suggestion.
///
/// `rule_ref`, when present, always names a rule the automation
/// collaborator actually returned during the same pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The observed fact that justifies the suggestion
    pub evidence: String,
    /// What the user should do about it
    pub action: String,
    pub rule_ref: Option<AutomationRuleRef>,
    /// Lower is more urgent; recommendations are sorted ascending
    pub priority: u8,
}

impl Recommendation {
    pub fn new(evidence: impl Into<String>, action: impl Into<String>, priority: u8) -> Self {
        Self {
            evidence: evidence.into(),
            action: action.into(),
            rule_ref: None,
            priority,
        }
    }

    pub fn with_rule(mut self, rule: AutomationRuleRef) -> Self {
        self.rule_ref = Some(rule);
        self
    }
}

/// Caller's request for one diagnostic pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRequest {
    pub device_id: String,
    /// How many recent events to analyze; the orchestrator default applies
    /// when absent
    pub window_size: Option<usize>,
}

impl DiagnosticRequest {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            window_size: None,
        }
    }

    pub fn with_window(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }
}

/// Final output of one diagnostic pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub device: DeviceSnapshot,
    /// Sorted by (severity desc, confidence desc, occurrences desc)
    pub findings: Vec<PatternFinding>,
    /// Sorted by priority ascending
    pub recommendations: Vec<Recommendation>,
    pub execution_time_ms: u64,
    pub events_analyzed: usize,
    /// Which evidence sources or algorithms could not be evaluated, so
    /// consumers can distinguish "no issues" from "missing evidence"
    pub partial_failures: Vec<String>,
}
