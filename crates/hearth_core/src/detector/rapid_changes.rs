//! Rapid-change and automation-trigger detection
//!
//! Two related signals over consecutive state changes of the same
//! attribute:
//!
//! - Toggles back to the opposite state faster than a person plausibly
//!   would: under `fast_toggle_secs` reads as automation
//!   (confidence `fast_toggle_confidence`), the fast..slow band is still
//!   suspicious (confidence `slow_toggle_confidence`).
//! - The explicit automation signature: a rule/scheduler-sourced event
//!   re-asserting a state a person just turned off, or state changes
//!   clustered in the quiet-hours band. This carries
//!   `automation_signature_confidence` and does not require a short gap.
//!
//! Severity breakpoints (score): >= 30 critical, >= 5 high, otherwise
//! medium. Fast toggles score `10 + 2n`, slow-only toggles score `n`,
//! so a single fast toggle already lands in the high tier.

use super::DetectorInput;
use chrono::{DateTime, Timelike, Utc};
use hearth_common::{
    DetectorConfig, DiagnosticError, Event, EvidenceWindow, PatternFinding, PatternType, Severity,
};
use std::collections::HashMap;

pub fn detect(input: &DetectorInput) -> Result<Vec<PatternFinding>, DiagnosticError> {
    let cfg = &input.config;
    let mut last_by_attr: HashMap<&str, &Event> = HashMap::new();

    let mut fast = 0usize;
    let mut slow = 0usize;
    let mut signature = 0usize;
    let mut quiet = 0usize;
    let mut toggle_span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    let mut signature_span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for event in &input.events {
        if let Some(prev) = last_by_attr.get(event.attribute.as_str()) {
            if prev.value != event.value {
                let gap = (event.timestamp - prev.timestamp).num_seconds();

                if (0..cfg.fast_toggle_secs as i64).contains(&gap) {
                    fast += 1;
                    extend(&mut toggle_span, prev.timestamp, event.timestamp);
                } else if gap < cfg.slow_toggle_secs as i64 {
                    slow += 1;
                    extend(&mut toggle_span, prev.timestamp, event.timestamp);
                }

                // Rule or scheduler re-asserting a state a person (or the
                // device itself) just switched off, at any gap size.
                if event.source.is_automated()
                    && !prev.source.is_automated()
                    && prev.value.eq_ignore_ascii_case("off")
                {
                    signature += 1;
                    extend(&mut signature_span, prev.timestamp, event.timestamp);
                }

                if in_quiet_band(event.timestamp.hour(), cfg) {
                    quiet += 1;
                    extend(&mut signature_span, event.timestamp, event.timestamp);
                }
            }
        }
        last_by_attr.insert(event.attribute.as_str(), event);
    }

    let mut findings = Vec::new();

    if fast > 0 || slow > 0 {
        let (confidence, score) = if fast > 0 {
            (cfg.fast_toggle_confidence, 10.0 + 2.0 * fast as f64)
        } else {
            (cfg.slow_toggle_confidence, slow as f64)
        };
        let span = toggle_span.unwrap_or((input.reference_time, input.reference_time));
        let summary = format!(
            "state toggled back within {}s of the opposite state {} time(s)",
            if fast > 0 { cfg.fast_toggle_secs } else { cfg.slow_toggle_secs },
            fast + slow,
        );
        findings.push(PatternFinding::new(
            &input.device_id,
            PatternType::RapidChanges,
            confidence,
            severity_for_score(score),
            score,
            fast + slow,
            EvidenceWindow::new(span.0, span.1),
            summary,
        ));
    }

    let quiet_clustered = quiet >= cfg.quiet_hours_min_events;
    if signature > 0 || quiet_clustered {
        let score = 10.0 + 3.0 * signature as f64 + quiet as f64;
        let span = signature_span.unwrap_or((input.reference_time, input.reference_time));
        let summary = if signature > 0 {
            format!(
                "a rule or scheduler re-triggered the device {} time(s) after it was switched off",
                signature
            )
        } else {
            format!(
                "{} state changes clustered in the {:02}:00-{:02}:00 quiet hours",
                quiet, cfg.quiet_hours_start, cfg.quiet_hours_end
            )
        };
        findings.push(PatternFinding::new(
            &input.device_id,
            PatternType::AutomationTrigger,
            cfg.automation_signature_confidence,
            severity_for_score(score),
            score,
            signature + quiet,
            EvidenceWindow::new(span.0, span.1),
            summary,
        ));
    }

    Ok(findings)
}

fn severity_for_score(score: f64) -> Severity {
    if score >= 30.0 {
        Severity::Critical
    } else if score >= 5.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn in_quiet_band(hour: u32, cfg: &DetectorConfig) -> bool {
    if cfg.quiet_hours_start <= cfg.quiet_hours_end {
        (cfg.quiet_hours_start..cfg.quiet_hours_end).contains(&hour)
    } else {
        // Band wraps midnight
        hour >= cfg.quiet_hours_start || hour < cfg.quiet_hours_end
    }
}

fn extend(span: &mut Option<(DateTime<Utc>, DateTime<Utc>)>, start: DateTime<Utc>, end: DateTime<Utc>) {
    match span {
        Some((s, e)) => {
            if start < *s {
                *s = start;
            }
            if end > *e {
                *e = end;
            }
        }
        None => *span = Some((start, end)),
    }
}
