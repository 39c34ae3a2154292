//! Event anomaly detection
//!
//! Two sub-signals, both reported as `event_anomaly`:
//!
//! - Repeated failures: the same capability reporting a failure-class
//!   value `repeated_failure_min`+ times inside the rolling failure
//!   window.
//! - Event storm: raw event density exceeding `storm_min_events` inside
//!   the rolling storm window.
//!
//! Score is the observed count divided by the configured threshold, so
//! both sub-signals share one breakpoint table: >= 4.0 critical,
//! >= 2.0 high, >= 1.0 medium.

use super::DetectorInput;
use chrono::{DateTime, Utc};
use hearth_common::{DiagnosticError, EvidenceWindow, PatternFinding, PatternType, Severity};
use std::collections::HashMap;

pub fn detect(input: &DetectorInput) -> Result<Vec<PatternFinding>, DiagnosticError> {
    let cfg = &input.config;
    let mut findings = Vec::new();

    // Repeated failures per (capability, attribute)
    let mut failure_times: HashMap<(&str, &str), Vec<DateTime<Utc>>> = HashMap::new();
    for event in input.events.iter().filter(|e| is_failure_value(&e.value)) {
        failure_times
            .entry((event.capability.as_str(), event.attribute.as_str()))
            .or_default()
            .push(event.timestamp);
    }

    let mut worst_failure: Option<(&str, usize, EvidenceWindow)> = None;
    for ((capability, _), mut times) in failure_times {
        times.sort_unstable();
        if let Some((count, window)) = densest_window(&times, cfg.failure_window_secs) {
            if count >= cfg.repeated_failure_min
                && worst_failure.map(|(_, c, _)| count > c).unwrap_or(true)
            {
                worst_failure = Some((capability, count, window));
            }
        }
    }

    if let Some((capability, count, window)) = worst_failure {
        let score = count as f64 / cfg.repeated_failure_min as f64;
        findings.push(PatternFinding::new(
            &input.device_id,
            PatternType::EventAnomaly,
            cfg.repeated_failure_confidence,
            severity_for_score(score),
            score,
            count,
            window,
            format!(
                "the {} capability reported failures {} times within {}s",
                capability, count, cfg.failure_window_secs
            ),
        ));
    }

    // Event storm over the whole window, any value
    let mut all_times: Vec<DateTime<Utc>> =
        input.events.iter().map(|e| e.timestamp).collect();
    all_times.sort_unstable();
    if let Some((count, window)) = densest_window(&all_times, cfg.storm_window_secs) {
        if count >= cfg.storm_min_events {
            let score = count as f64 / cfg.storm_min_events as f64;
            findings.push(PatternFinding::new(
                &input.device_id,
                PatternType::EventAnomaly,
                cfg.storm_confidence,
                severity_for_score(score),
                score,
                count,
                window,
                format!("{} events within {}s", count, cfg.storm_window_secs),
            ));
        }
    }

    Ok(findings)
}

/// Values the platform uses to report a failed command or an error state.
fn is_failure_value(value: &str) -> bool {
    let v = value.to_lowercase();
    v.contains("fail") || v.contains("error") || v.contains("timeout") || v == "offline"
}

/// Largest event count inside any `window_secs`-wide span, with the span
/// it occurred in. Input must be sorted.
fn densest_window(
    times: &[DateTime<Utc>],
    window_secs: u64,
) -> Option<(usize, EvidenceWindow)> {
    if times.is_empty() {
        return None;
    }
    let mut best = (0usize, 0usize, 0usize); // count, start idx, end idx
    let mut lo = 0usize;
    for hi in 0..times.len() {
        while (times[hi] - times[lo]).num_seconds() > window_secs as i64 {
            lo += 1;
        }
        let count = hi - lo + 1;
        if count > best.0 {
            best = (count, lo, hi);
        }
    }
    Some((best.0, EvidenceWindow::new(times[best.1], times[best.2])))
}

fn severity_for_score(score: f64) -> Severity {
    if score >= 4.0 {
        Severity::Critical
    } else if score >= 2.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}
