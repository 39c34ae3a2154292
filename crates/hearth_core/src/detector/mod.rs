//! Pattern detector
//!
//! A registry of independent, pure detection algorithms dispatched
//! concurrently over one device's event window. The join collects every
//! outcome; one slow or failing algorithm never blocks or voids the
//! others. Each algorithm runs under a soft deadline and is abandoned
//! (best-effort) past it.
//!
//! Adding a pattern type means adding an entry to [`standard_registry`];
//! orchestration code never changes.

mod anomaly;
mod battery;
mod connectivity;
mod rapid_changes;

use chrono::{DateTime, Utc};
use hearth_common::{
    DetectorConfig, DeviceSnapshot, DiagnosticError, Event, PatternFinding,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Immutable input shared by every algorithm in one pass.
#[derive(Debug, Clone)]
pub struct DetectorInput {
    pub device_id: String,
    /// Event window in delivered order
    pub events: Vec<Event>,
    pub health: Option<DeviceSnapshot>,
    /// Fixed "now" for the pass; detection never reads the wall clock
    pub reference_time: DateTime<Utc>,
    pub config: DetectorConfig,
}

/// One detection algorithm: a pure function of the shared input.
pub type AlgorithmFn = fn(&DetectorInput) -> Result<Vec<PatternFinding>, DiagnosticError>;

#[derive(Debug, Clone, Copy)]
pub struct AlgorithmEntry {
    pub name: &'static str,
    pub run: AlgorithmFn,
}

/// The built-in strategy table.
pub fn standard_registry() -> Vec<AlgorithmEntry> {
    vec![
        AlgorithmEntry {
            name: "connectivity_gap",
            run: connectivity::detect,
        },
        AlgorithmEntry {
            name: "rapid_changes",
            run: rapid_changes::detect,
        },
        AlgorithmEntry {
            name: "event_anomaly",
            run: anomaly::detect,
        },
        AlgorithmEntry {
            name: "battery_degradation",
            run: battery::detect,
        },
    ]
}

/// Everything one detection pass produced: the merged findings plus the
/// algorithms that could not contribute.
#[derive(Debug, Clone)]
pub struct DetectorOutcome {
    pub findings: Vec<PatternFinding>,
    pub failed: Vec<DiagnosticError>,
}

/// Dispatches the algorithm registry concurrently and merges outcomes.
pub struct PatternDetector {
    timeout: Duration,
    algorithms: Vec<AlgorithmEntry>,
}

impl PatternDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            timeout: config.algorithm_timeout(),
            algorithms: standard_registry(),
        }
    }

    /// Detector with a custom algorithm table, for tests and hosts that
    /// register extra patterns.
    pub fn with_algorithms(timeout: Duration, algorithms: Vec<AlgorithmEntry>) -> Self {
        Self { timeout, algorithms }
    }

    /// Run every algorithm against the same immutable input and collect
    /// all outcomes. Never fails as a whole: a failed or timed-out
    /// algorithm becomes an entry in `DetectorOutcome::failed`.
    pub async fn detect(&self, input: DetectorInput) -> DetectorOutcome {
        let input = Arc::new(input);
        let mut join_set = JoinSet::new();

        for (idx, entry) in self.algorithms.iter().enumerate() {
            let input = Arc::clone(&input);
            let name = entry.name;
            let run = entry.run;
            let deadline = self.timeout;

            join_set.spawn(async move {
                let handle = tokio::task::spawn_blocking(move || run(&input));
                let outcome = match tokio::time::timeout(deadline, handle).await {
                    Err(_) => Err(DiagnosticError::AlgorithmTimeout(name.to_string())),
                    Ok(Err(join_err)) => Err(DiagnosticError::AlgorithmFailure {
                        name: name.to_string(),
                        reason: if join_err.is_panic() {
                            "panicked".to_string()
                        } else {
                            join_err.to_string()
                        },
                    }),
                    Ok(Ok(result)) => result,
                };
                (idx, outcome)
            });
        }

        // Slots keyed by registry index so completion order never leaks
        // into the merged output.
        let mut slots: Vec<Option<Result<Vec<PatternFinding>, DiagnosticError>>> =
            (0..self.algorithms.len()).map(|_| None).collect();

        while let Some(joined) = join_set.join_next().await {
            if let Ok((idx, outcome)) = joined {
                slots[idx] = Some(outcome);
            }
        }

        let mut findings = Vec::new();
        let mut failed = Vec::new();
        for (entry, slot) in self.algorithms.iter().zip(slots) {
            match slot {
                Some(Ok(batch)) => {
                    debug!("algorithm {} produced {} finding(s)", entry.name, batch.len());
                    findings.extend(batch);
                }
                Some(Err(err)) => {
                    warn!("algorithm {} excluded from pass: {}", entry.name, err);
                    failed.push(err);
                }
                // Join errors on the outer task; attribute to the algorithm
                None => failed.push(DiagnosticError::AlgorithmFailure {
                    name: entry.name.to_string(),
                    reason: "dispatch task lost".to_string(),
                }),
            }
        }

        DetectorOutcome {
            findings: merge_findings(findings),
            failed,
        }
    }
}

/// Merge policy: dedup by `(device_id, pattern)` keeping the higher
/// confidence, then sort by (severity desc, confidence desc,
/// occurrences desc) with the pattern name as a final deterministic
/// tie-break.
pub fn merge_findings(findings: Vec<PatternFinding>) -> Vec<PatternFinding> {
    let mut merged: Vec<PatternFinding> = Vec::with_capacity(findings.len());
    for finding in findings {
        match merged
            .iter_mut()
            .find(|f| f.device_id == finding.device_id && f.pattern == finding.pattern)
        {
            Some(existing) => {
                if finding.confidence > existing.confidence {
                    *existing = finding;
                }
            }
            None => merged.push(finding),
        }
    }

    merged.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| b.occurrences.cmp(&a.occurrences))
            .then_with(|| a.pattern.to_string().cmp(&b.pattern.to_string()))
    });
    merged
}
