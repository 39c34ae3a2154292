//! Battery degradation detection
//!
//! Two classes of finding, both `battery_degradation`:
//!
//! - Low level, straight from the health snapshot: below `battery_low`
//!   medium, below `battery_very_low` high, below `battery_critical`
//!   critical.
//! - Accelerated decline, from successive battery readings in the event
//!   window falling faster than `battery_decline_per_hour`. A healthy
//!   level draining this fast is worse news than a low level alone, so
//!   this class starts at high severity and carries slightly higher
//!   confidence, which also makes it the instance the merge keeps.
//!
//! Both classes share one score scale: > 90 critical, > 85 high,
//! > 80 medium. Level findings score `100 - level`; decline findings
//! score `86 + excess/2` where excess is the rate above the threshold,
//! capped at 14.

use super::DetectorInput;
use hearth_common::{
    DiagnosticError, Event, EvidenceWindow, PatternFinding, PatternType, Severity,
};

pub fn detect(input: &DetectorInput) -> Result<Vec<PatternFinding>, DiagnosticError> {
    let cfg = &input.config;
    let mut findings = Vec::new();

    if let Some(level) = input.health.as_ref().and_then(|h| h.battery_level) {
        if level < cfg.battery_low {
            let score = (100 - level) as f64;
            let summary = format!("battery level is {}%", level);
            findings.push(PatternFinding::new(
                &input.device_id,
                PatternType::BatteryDegradation,
                cfg.battery_confidence,
                severity_for_score(score),
                score,
                1,
                EvidenceWindow::new(input.reference_time, input.reference_time),
                summary,
            ));
        }
    }

    let readings: Vec<&Event> = input
        .events
        .iter()
        .filter(|e| e.attribute.eq_ignore_ascii_case("battery") && e.numeric_value().is_some())
        .collect();

    if let (Some(first), Some(last)) = (readings.first(), readings.last()) {
        let hours = (last.timestamp - first.timestamp).num_seconds() as f64 / 3600.0;
        if hours > 0.0 {
            // numeric_value checked in the filter above
            let drop = first.numeric_value().unwrap_or(0.0) - last.numeric_value().unwrap_or(0.0);
            let rate = drop / hours;
            if rate > cfg.battery_decline_per_hour {
                let excess = rate - cfg.battery_decline_per_hour;
                let score = 86.0 + (excess / 2.0).min(14.0);
                let summary = format!(
                    "battery fell from {}% to {}% in {:.1}h ({:.1} points/hour)",
                    first.value.trim(),
                    last.value.trim(),
                    hours,
                    rate
                );
                findings.push(PatternFinding::new(
                    &input.device_id,
                    PatternType::BatteryDegradation,
                    cfg.battery_decline_confidence,
                    severity_for_score(score),
                    score,
                    readings.len(),
                    EvidenceWindow::new(first.timestamp, last.timestamp),
                    summary,
                ));
            }
        }
    }

    Ok(findings)
}

fn severity_for_score(score: f64) -> Severity {
    if score > 90.0 {
        Severity::Critical
    } else if score > 85.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::test_support::{battery_event, input_with_events, input_with_health};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_low_battery_levels() {
        for (level, expected) in [
            (15u8, Some(Severity::Medium)),
            (12, Some(Severity::High)),
            (8, Some(Severity::Critical)),
            (60, None),
        ] {
            let input = input_with_health(Vec::new(), Some(level));
            let findings = detect(&input).unwrap();
            match expected {
                Some(severity) => {
                    assert_eq!(findings.len(), 1, "level {}", level);
                    assert_eq!(findings[0].severity, severity, "level {}", level);
                    assert!(findings[0].summary.contains(&format!("{}%", level)));
                }
                None => assert!(findings.is_empty(), "level {}", level),
            }
        }
    }

    #[test]
    fn test_accelerated_decline_from_readings() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        // 80% -> 50% over 3 hours: 10 points/hour against a 5.0 threshold
        let events = vec![
            battery_event(t0, 80),
            battery_event(t0 + Duration::hours(1), 70),
            battery_event(t0 + Duration::hours(2), 60),
            battery_event(t0 + Duration::hours(3), 50),
        ];
        let input = input_with_events(events, t0 + Duration::hours(3));

        let findings = detect(&input).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, PatternType::BatteryDegradation);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].confidence, 0.92);
        assert_eq!(findings[0].occurrences, 4);
        assert!(findings[0].summary.contains("points/hour"));
    }

    #[test]
    fn test_normal_decline_not_flagged() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        // 2 points/hour is ordinary drain
        let events = vec![
            battery_event(t0, 80),
            battery_event(t0 + Duration::hours(5), 70),
        ];
        let input = input_with_events(events, t0 + Duration::hours(5));

        assert!(detect(&input).unwrap().is_empty());
    }

    #[test]
    fn test_low_level_and_decline_both_reported() {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let events = vec![
            battery_event(t0, 40),
            battery_event(t0 + Duration::hours(2), 18),
        ];
        let mut input = input_with_health(events, Some(18));
        input.reference_time = t0 + Duration::hours(2);

        let findings = detect(&input).unwrap();
        assert_eq!(findings.len(), 2);
        // The decline instance carries the higher confidence, so the
        // detector-level merge keeps it
        let decline = findings.iter().max_by(|a, b| a.confidence.total_cmp(&b.confidence)).unwrap();
        assert!(decline.summary.contains("fell"));
    }

    #[test]
    fn test_no_health_snapshot_no_level_finding() {
        let input = input_with_events(Vec::new(), Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap());
        assert!(detect(&input).unwrap().is_empty());
    }
}
