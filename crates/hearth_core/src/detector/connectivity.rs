//! Connectivity gap detection
//!
//! Scans consecutive event timestamps for silences longer than the
//! configured threshold. The tail gap between the last event and the
//! pass's reference time counts too; a device that went quiet an hour
//! ago is as interesting as one that was quiet mid-window.
//!
//! Severity breakpoints (gap length): > `gap_critical_secs` critical,
//! > `gap_high_secs` high, otherwise medium. Confidence is the fixed
//! `gap_confidence` baseline; an absence of events is directly
//! observable, not inferred.

use super::DetectorInput;
use chrono::{DateTime, Utc};
use hearth_common::{
    DetectorConfig, DiagnosticError, EvidenceWindow, PatternFinding, PatternType, Severity,
};

pub fn detect(input: &DetectorInput) -> Result<Vec<PatternFinding>, DiagnosticError> {
    let cfg = &input.config;
    if input.events.is_empty() {
        return Ok(Vec::new());
    }

    let mut occurrences = 0usize;
    let mut widest: Option<(DateTime<Utc>, DateTime<Utc>, i64)> = None;

    let mut note_gap = |start: DateTime<Utc>, end: DateTime<Utc>| {
        let secs = (end - start).num_seconds();
        if secs > cfg.gap_medium_secs as i64 {
            occurrences += 1;
            if widest.map(|(_, _, w)| secs > w).unwrap_or(true) {
                widest = Some((start, end, secs));
            }
        }
    };

    for pair in input.events.windows(2) {
        note_gap(pair[0].timestamp, pair[1].timestamp);
    }
    if let Some(last) = input.events.last() {
        note_gap(last.timestamp, input.reference_time);
    }

    let Some((start, end, widest_secs)) = widest else {
        return Ok(Vec::new());
    };

    let severity = severity_for_gap(widest_secs, cfg);
    let summary = format!(
        "no events for {} between {} and {}",
        format_gap(widest_secs),
        start.format("%Y-%m-%d %H:%M UTC"),
        end.format("%Y-%m-%d %H:%M UTC"),
    );

    Ok(vec![PatternFinding::new(
        &input.device_id,
        PatternType::ConnectivityGap,
        cfg.gap_confidence,
        severity,
        widest_secs as f64,
        occurrences,
        EvidenceWindow::new(start, end),
        summary,
    )])
}

fn severity_for_gap(secs: i64, cfg: &DetectorConfig) -> Severity {
    if secs > cfg.gap_critical_secs as i64 {
        Severity::Critical
    } else if secs > cfg.gap_high_secs as i64 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Render a gap in seconds as a short human-readable duration.
fn format_gap(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 && minutes > 0 {
        format!("{}h {}m", hours, minutes)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", minutes)
    }
}
