//! Diagnostic orchestrator
//!
//! Ordered stages, stateless across requests:
//! validate device -> gather context (parallel) -> detect patterns ->
//! synthesize recommendations -> assemble report.
//!
//! Only a missing device or malformed input aborts a pass. Every other
//! failure - a collaborator down, an algorithm timing out, the overall
//! budget expiring - degrades into an annotated partial report, so
//! consumers can always tell "no issues found" apart from "some evidence
//! sources were unavailable".

use crate::cache::{CacheKey, ResultCache};
use crate::collaborators::{AutomationIndex, DeviceHealth, EventStore};
use crate::detector::{DetectorInput, PatternDetector};
use crate::recommender::{synthesize, SynthInput};
use chrono::Utc;
use hearth_common::{
    AutomationRuleRef, CompanionAppTable, DeviceSnapshot, DiagnosticError, DiagnosticReport,
    DiagnosticRequest, DiagnosticsConfig, Event,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

const MAX_DEVICE_ID_LEN: usize = 128;

pub struct DiagnosticEngine<E, H, A> {
    events: Arc<E>,
    health: Arc<H>,
    rules: Arc<A>,
    detector: PatternDetector,
    cache: ResultCache,
    companion_apps: CompanionAppTable,
    config: DiagnosticsConfig,
}

impl<E, H, A> DiagnosticEngine<E, H, A>
where
    E: EventStore,
    H: DeviceHealth,
    A: AutomationIndex,
{
    pub fn new(
        events: Arc<E>,
        health: Arc<H>,
        rules: Arc<A>,
        config: DiagnosticsConfig,
    ) -> Self {
        Self {
            events,
            health,
            rules,
            detector: PatternDetector::new(&config.detector),
            cache: ResultCache::new(config.cache.clone()),
            companion_apps: CompanionAppTable::default(),
            config,
        }
    }

    /// Run one diagnostic pass, going through the single-flight cache.
    pub async fn diagnose(
        &self,
        request: &DiagnosticRequest,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        validate_request(request)?;
        let window_size = request
            .window_size
            .unwrap_or(self.config.orchestrator.default_window_size);
        let key = CacheKey {
            device_id: request.device_id.clone(),
            window_size,
        };

        self.cache
            .get_or_compute(key, || self.run_pass(request.device_id.clone(), window_size))
            .await
    }

    /// Drop cached reports for a device, e.g. when a collaborator
    /// signals new events.
    pub async fn invalidate_device(&self, device_id: &str) {
        self.cache.invalidate(device_id).await;
    }

    async fn run_pass(
        &self,
        device_id: String,
        window_size: usize,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        let started = Instant::now();
        let deadline = started + self.config.orchestrator.overall_budget();
        let mut partial_failures: Vec<String> = Vec::new();

        info!("diagnosing {} over a {}-event window", device_id, window_size);

        // Stage 1: validate device. Existence is mandatory; the health
        // snapshot itself is optional context.
        let health = match timeout(
            self.stage_budget(deadline),
            self.health.get_health(&device_id),
        )
        .await
        {
            Ok(Ok(Some(snapshot))) => Some(snapshot),
            Ok(Ok(None)) => return Err(DiagnosticError::DeviceNotFound(device_id)),
            Ok(Err(err)) if err.is_fatal() => return Err(err),
            Ok(Err(err)) => {
                warn!("device health unavailable for {}: {}", device_id, err);
                partial_failures.push(format!("device health unavailable: {}", err));
                None
            }
            Err(_) => {
                warn!("device health timed out for {}", device_id);
                partial_failures.push("device health unavailable: timed out".to_string());
                None
            }
        };

        // Stage 2: gather remaining context concurrently; each source is
        // independent and each failure is non-fatal.
        let stage = self.stage_budget(deadline);
        let (events_outcome, rules_outcome) = tokio::join!(
            timeout(stage, self.events.get_events(&device_id, window_size)),
            timeout(stage, self.rules.find_rules_for_device(&device_id)),
        );

        let events: Vec<Event> = match flatten(events_outcome, "event history") {
            Ok(events) => events,
            Err(err) => {
                warn!("{}", err);
                partial_failures.push(err.to_string());
                Vec::new()
            }
        };
        let rules: Option<Vec<AutomationRuleRef>> =
            match flatten(rules_outcome, "automation context") {
                Ok(rules) => Some(rules),
                Err(err) => {
                    warn!("{}", err);
                    partial_failures.push(err.to_string());
                    None
                }
            };

        // Stage 3: detect patterns, inside whatever budget remains.
        let events_analyzed = events.len();
        let findings = if Instant::now() >= deadline {
            partial_failures.push("diagnostic budget exceeded; detection skipped".to_string());
            Vec::new()
        } else {
            let input = DetectorInput {
                device_id: device_id.clone(),
                events,
                health: health.clone(),
                reference_time: Utc::now(),
                config: self.config.detector.clone(),
            };
            match timeout(self.stage_budget(deadline), self.detector.detect(input)).await {
                Ok(outcome) => {
                    for err in &outcome.failed {
                        partial_failures.push(err.to_string());
                    }
                    outcome.findings
                }
                Err(_) => {
                    partial_failures
                        .push("diagnostic budget exceeded; detection abandoned".to_string());
                    Vec::new()
                }
            }
        };

        // Stage 4: synthesize. Pure; runs on whatever evidence survived.
        let recommendations = synthesize(&SynthInput {
            device: health.as_ref(),
            findings: &findings,
            rules: rules.as_deref(),
            companion_apps: &self.companion_apps,
            config: &self.config.detector,
        });

        // Stage 5: assemble.
        let report = DiagnosticReport {
            device: health.unwrap_or_else(|| DeviceSnapshot::placeholder(&device_id)),
            findings,
            recommendations,
            execution_time_ms: started.elapsed().as_millis() as u64,
            events_analyzed,
            partial_failures,
        };
        debug!(
            "pass for {} finished in {}ms: {} finding(s), {} recommendation(s), {} partial failure(s)",
            report.device.id,
            report.execution_time_ms,
            report.findings.len(),
            report.recommendations.len(),
            report.partial_failures.len(),
        );
        Ok(report)
    }

    /// Per-stage timeout bounded by what is left of the overall budget.
    fn stage_budget(&self, deadline: Instant) -> Duration {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.config.orchestrator.context_timeout().min(remaining)
    }
}

fn validate_request(request: &DiagnosticRequest) -> Result<(), DiagnosticError> {
    let id = request.device_id.trim();
    if id.is_empty() {
        return Err(DiagnosticError::InvalidInput(
            "device id must not be empty".to_string(),
        ));
    }
    if request.device_id.len() > MAX_DEVICE_ID_LEN {
        return Err(DiagnosticError::InvalidInput(format!(
            "device id longer than {} characters",
            MAX_DEVICE_ID_LEN
        )));
    }
    if request.device_id.chars().any(|c| c.is_control()) {
        return Err(DiagnosticError::InvalidInput(
            "device id contains control characters".to_string(),
        ));
    }
    if request.window_size == Some(0) {
        return Err(DiagnosticError::InvalidInput(
            "window size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Collapse a timeout wrapper and a collaborator result into one
/// degradable error naming the source.
fn flatten<T>(
    outcome: Result<Result<T, DiagnosticError>, tokio::time::error::Elapsed>,
    source_name: &str,
) -> Result<T, DiagnosticError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        // Re-annotate with the orchestrator's name for the source, so
        // `partial_failures` wording is stable across collaborators
        Ok(Err(DiagnosticError::CollaboratorUnavailable { reason, .. })) => {
            Err(DiagnosticError::unavailable(source_name, reason))
        }
        Ok(Err(err)) => Err(DiagnosticError::unavailable(source_name, err.to_string())),
        Err(_) => Err(DiagnosticError::unavailable(source_name, "timed out")),
    }
}
