//! Recommendation synthesizer
//!
//! An ordered, accumulating rule table: every rule whose predicate
//! matches appends recommendations; rules are not mutually exclusive.
//! Every recommendation cites observed evidence - a finding summary, an
//! exact battery level, a rule the automation collaborator actually
//! returned. Nothing is ever asserted that was not observed in this
//! pass: when no specific rule can be identified, the guidance says so
//! instead of inventing a rule name or count.
//!
//! Pure function of its inputs; never fails; always returns at least one
//! recommendation.

use hearth_common::{
    AutomationRuleRef, CompanionAppTable, DetectorConfig, DeviceSnapshot, PatternFinding,
    PatternType, Recommendation,
};

/// Everything the synthesizer is allowed to look at for one pass.
pub struct SynthInput<'a> {
    /// Health snapshot, absent when the health collaborator was
    /// unavailable
    pub device: Option<&'a DeviceSnapshot>,
    pub findings: &'a [PatternFinding],
    /// `None` when the automation collaborator was unavailable this
    /// pass; `Some` carries exactly the rules it returned
    pub rules: Option<&'a [AutomationRuleRef]>,
    pub companion_apps: &'a CompanionAppTable,
    pub config: &'a DetectorConfig,
}

impl<'a> SynthInput<'a> {
    fn finding(&self, pattern: PatternType) -> Option<&'a PatternFinding> {
        self.findings.iter().find(|f| f.pattern == pattern)
    }

    /// Highest-confidence automation-churn finding, if any.
    fn churn_finding(&self) -> Option<&'a PatternFinding> {
        self.findings
            .iter()
            .filter(|f| {
                matches!(
                    f.pattern,
                    PatternType::RapidChanges | PatternType::AutomationTrigger
                )
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

/// One evidence-gated rule: `applies` guards, `build` appends.
pub struct SynthRule {
    pub name: &'static str,
    pub applies: fn(&SynthInput) -> bool,
    pub build: fn(&SynthInput) -> Vec<Recommendation>,
}

/// The ordered rule table, evaluated top to bottom.
pub fn rule_table() -> Vec<SynthRule> {
    vec![
        SynthRule {
            name: "offline",
            applies: |input| input.device.map(|d| !d.online).unwrap_or(false),
            build: |_input| {
                vec![Recommendation::new(
                    "device is offline",
                    "Check the device's power supply and network connectivity.",
                    1,
                )]
            },
        },
        SynthRule {
            name: "low_battery",
            applies: |input| {
                input
                    .device
                    .and_then(|d| d.battery_level)
                    .map(|lvl| lvl < input.config.battery_low)
                    .unwrap_or(false)
            },
            build: |input| {
                let Some(level) = input.device.and_then(|d| d.battery_level) else {
                    return Vec::new();
                };
                let (action, priority) = if level < input.config.battery_critical {
                    (
                        "Replace the battery now; the device may stop reporting at any moment.",
                        1,
                    )
                } else {
                    ("Replace the battery soon.", 2)
                };
                vec![Recommendation::new(
                    format!("battery level is {}%", level),
                    action,
                    priority,
                )]
            },
        },
        SynthRule {
            name: "connectivity_gap",
            applies: |input| input.finding(PatternType::ConnectivityGap).is_some(),
            build: |input| {
                let Some(finding) = input.finding(PatternType::ConnectivityGap) else {
                    return Vec::new();
                };
                vec![Recommendation::new(
                    finding.summary.clone(),
                    "Check the device's network connection and hub stability.",
                    2,
                )]
            },
        },
        SynthRule {
            name: "automation_churn",
            applies: |input| input.churn_finding().is_some(),
            build: build_automation_churn,
        },
        SynthRule {
            name: "event_anomaly",
            applies: |input| input.finding(PatternType::EventAnomaly).is_some(),
            build: |input| {
                let Some(finding) = input.finding(PatternType::EventAnomaly) else {
                    return Vec::new();
                };
                vec![Recommendation::new(
                    finding.summary.clone(),
                    "Check the device and its hub load; repeated failures or event bursts \
                     usually mean a failing device or a misbehaving integration.",
                    3,
                )]
            },
        },
    ]
}

/// Strict branch order for automation-driven churn:
/// (a) known companion app for the manufacturer, since proprietary
/// automations there are invisible to this platform's rule index;
/// (b) otherwise name every rule the automation collaborator returned;
/// (c) otherwise generic guidance that explicitly says no specific rule
/// could be identified.
fn build_automation_churn(input: &SynthInput) -> Vec<Recommendation> {
    let Some(finding) = input.churn_finding() else {
        return Vec::new();
    };

    if let Some((manufacturer, app)) = input.device.and_then(|d| {
        d.manufacturer
            .as_deref()
            .and_then(|m| input.companion_apps.lookup(m).map(|app| (m, app)))
    }) {
        return vec![Recommendation::new(
            format!("{}; device manufacturer is {}", finding.summary, manufacturer),
            format!(
                "Open the {} app and review its automations and schedules first; \
                 automations configured there are invisible to this platform.",
                app
            ),
            2,
        )];
    }

    if let Some(rules) = input.rules.filter(|r| !r.is_empty()) {
        return rules
            .iter()
            .map(|rule| {
                Recommendation::new(
                    finding.summary.clone(),
                    format!(
                        "Review automation rule '{}' ({}), where this device is the {}.",
                        rule.name, rule.rule_id, rule.role
                    ),
                    2,
                )
                .with_rule(rule.clone())
            })
            .collect();
    }

    vec![Recommendation::new(
        finding.summary.clone(),
        "Inspect the platform's automation and rule list for this device; \
         no specific rule could be identified from available evidence.",
        3,
    )]
}

/// Evaluate the rule table and return prioritized recommendations.
pub fn synthesize(input: &SynthInput) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    for rule in rule_table() {
        if (rule.applies)(input) {
            recommendations.extend((rule.build)(input));
        }
    }

    if recommendations.is_empty() {
        recommendations.push(Recommendation::new(
            "no issues detected in the analyzed window",
            "No action needed.",
            9,
        ));
    }

    // Stable sort keeps table order within a priority tier
    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hearth_common::{EvidenceWindow, RuleRole, Severity};

    fn snapshot(online: bool, battery: Option<u8>, manufacturer: Option<&str>) -> DeviceSnapshot {
        DeviceSnapshot {
            id: "dev-1".to_string(),
            name: "Hallway Light".to_string(),
            manufacturer: manufacturer.map(|m| m.to_string()),
            online,
            battery_level: battery,
            last_seen: None,
        }
    }

    fn finding(pattern: PatternType, confidence: f64) -> PatternFinding {
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        PatternFinding::new(
            "dev-1",
            pattern,
            confidence,
            Severity::High,
            12.0,
            2,
            EvidenceWindow::new(t, t),
            format!("{} observed", pattern),
        )
    }

    fn rule_ref(id: &str, name: &str) -> AutomationRuleRef {
        AutomationRuleRef {
            rule_id: id.to_string(),
            name: name.to_string(),
            role: RuleRole::Action,
            device_id: "dev-1".to_string(),
        }
    }

    struct Fixture {
        device: Option<DeviceSnapshot>,
        findings: Vec<PatternFinding>,
        rules: Option<Vec<AutomationRuleRef>>,
        apps: CompanionAppTable,
        config: DetectorConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                device: Some(snapshot(true, None, None)),
                findings: Vec::new(),
                rules: Some(Vec::new()),
                apps: CompanionAppTable::default(),
                config: DetectorConfig::default(),
            }
        }

        fn synthesize(&self) -> Vec<Recommendation> {
            synthesize(&SynthInput {
                device: self.device.as_ref(),
                findings: &self.findings,
                rules: self.rules.as_deref(),
                companion_apps: &self.apps,
                config: &self.config,
            })
        }
    }

    #[test]
    fn test_healthy_device_gets_no_issues_recommendation() {
        let recs = Fixture::new().synthesize();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].evidence, "no issues detected in the analyzed window");
    }

    #[test]
    fn test_offline_device() {
        let mut fx = Fixture::new();
        fx.device = Some(snapshot(false, None, None));
        let recs = fx.synthesize();
        assert_eq!(recs[0].evidence, "device is offline");
        assert_eq!(recs[0].priority, 1);
    }

    #[test]
    fn test_battery_cites_exact_level_and_escalates() {
        let mut fx = Fixture::new();
        fx.device = Some(snapshot(true, Some(15), None));
        let recs = fx.synthesize();
        assert_eq!(recs[0].evidence, "battery level is 15%");
        assert!(recs[0].action.contains("soon"));

        fx.device = Some(snapshot(true, Some(7), None));
        let recs = fx.synthesize();
        assert!(recs[0].action.contains("now"));
        assert_eq!(recs[0].priority, 1);
    }

    #[test]
    fn test_healthy_battery_no_recommendation() {
        let mut fx = Fixture::new();
        fx.device = Some(snapshot(true, Some(60), None));
        let recs = fx.synthesize();
        assert!(recs.iter().all(|r| !r.evidence.contains("battery")));
    }

    #[test]
    fn test_companion_app_branch_wins_over_rule_listing() {
        let mut fx = Fixture::new();
        fx.device = Some(snapshot(true, None, Some("Aqara (Lumi United)")));
        fx.findings = vec![finding(PatternType::RapidChanges, 0.95)];
        // Rules exist, but the companion-app branch takes priority
        fx.rules = Some(vec![rule_ref("r-1", "Night Mode")]);

        let recs = fx.synthesize();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].action.contains("Aqara Home"));
        assert!(recs[0].rule_ref.is_none());
    }

    #[test]
    fn test_observed_rules_are_named_individually() {
        let mut fx = Fixture::new();
        fx.findings = vec![finding(PatternType::AutomationTrigger, 0.98)];
        fx.rules = Some(vec![
            rule_ref("r-1", "Night Mode"),
            rule_ref("r-2", "Vacation Lighting"),
        ]);

        let recs = fx.synthesize();
        assert_eq!(recs.len(), 2);
        assert!(recs[0].action.contains("Night Mode"));
        assert!(recs[1].action.contains("Vacation Lighting"));
        // Every cited rule comes from the collaborator's response
        assert!(recs
            .iter()
            .all(|r| r.rule_ref.as_ref().map(|rr| rr.rule_id.starts_with("r-")).unwrap_or(false)));
    }

    #[test]
    fn test_generic_branch_when_automation_context_unavailable() {
        let mut fx = Fixture::new();
        fx.findings = vec![finding(PatternType::RapidChanges, 0.95)];
        fx.rules = None;

        let recs = fx.synthesize();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].action.contains("no specific rule could be identified"));
        assert!(recs[0].rule_ref.is_none());
    }

    #[test]
    fn test_generic_branch_when_no_rules_observed() {
        let mut fx = Fixture::new();
        fx.findings = vec![finding(PatternType::RapidChanges, 0.95)];
        fx.rules = Some(Vec::new());

        let recs = fx.synthesize();
        assert!(recs[0].action.contains("no specific rule could be identified"));
    }

    #[test]
    fn test_rules_accumulate_and_sort_by_priority() {
        let mut fx = Fixture::new();
        fx.device = Some(snapshot(false, Some(7), None));
        fx.findings = vec![
            finding(PatternType::ConnectivityGap, 0.8),
            finding(PatternType::EventAnomaly, 0.9),
        ];

        let recs = fx.synthesize();
        // offline + battery + gap + anomaly all fire
        assert_eq!(recs.len(), 4);
        let priorities: Vec<u8> = recs.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
        assert_eq!(recs[0].evidence, "device is offline");
    }

    #[test]
    fn test_synthesizer_is_pure() {
        let mut fx = Fixture::new();
        fx.findings = vec![finding(PatternType::AutomationTrigger, 0.98)];
        fx.rules = Some(vec![rule_ref("r-1", "Night Mode")]);
        assert_eq!(fx.synthesize(), fx.synthesize());
    }
}
