//! In-memory fake collaborators for pipeline tests.
//!
//! No network, no shell, no wall-clock dependence beyond the events the
//! test itself constructs.

// Each test binary uses a different subset of this module
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use hearth_common::{
    AutomationRuleRef, DeviceSnapshot, DiagnosticError, DiagnosticsConfig, Event, EventSource,
    RuleRole,
};
use hearth_core::{AutomationIndex, DeviceHealth, DiagnosticEngine, EventStore};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeEventStore {
    events: Mutex<Vec<Event>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicU32,
}

impl FakeEventStore {
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Mutex::new(events),
            fail: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        let store = Self::with_events(Vec::new());
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl EventStore for FakeEventStore {
    async fn get_events(
        &self,
        _device_id: &str,
        limit: usize,
    ) -> Result<Vec<Event>, DiagnosticError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiagnosticError::unavailable("event history", "connection reset"));
        }
        let events = self.events.lock().unwrap();
        Ok(events.iter().take(limit).cloned().collect())
    }
}

pub struct FakeDeviceHealth {
    snapshot: Mutex<Option<DeviceSnapshot>>,
    fail: AtomicBool,
}

impl FakeDeviceHealth {
    pub fn with_snapshot(snapshot: DeviceSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            fail: AtomicBool::new(false),
        }
    }

    pub fn unknown_device() -> Self {
        Self {
            snapshot: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let health = Self::unknown_device();
        health.fail.store(true, Ordering::SeqCst);
        health
    }
}

#[async_trait]
impl DeviceHealth for FakeDeviceHealth {
    async fn get_health(
        &self,
        _device_id: &str,
    ) -> Result<Option<DeviceSnapshot>, DiagnosticError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiagnosticError::unavailable("device health", "gateway error"));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

pub struct FakeAutomationIndex {
    rules: Vec<AutomationRuleRef>,
    fail: AtomicBool,
}

impl FakeAutomationIndex {
    pub fn with_rules(rules: Vec<AutomationRuleRef>) -> Self {
        Self {
            rules,
            fail: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Self::with_rules(Vec::new())
    }

    pub fn failing() -> Self {
        let index = Self::empty();
        index.fail.store(true, Ordering::SeqCst);
        index
    }
}

#[async_trait]
impl AutomationIndex for FakeAutomationIndex {
    async fn find_rules_for_device(
        &self,
        _device_id: &str,
    ) -> Result<Vec<AutomationRuleRef>, DiagnosticError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiagnosticError::unavailable("automation rules", "service down"));
        }
        Ok(self.rules.clone())
    }
}

pub type TestEngine = DiagnosticEngine<FakeEventStore, FakeDeviceHealth, FakeAutomationIndex>;

pub fn engine(
    events: FakeEventStore,
    health: FakeDeviceHealth,
    rules: FakeAutomationIndex,
) -> TestEngine {
    engine_with_config(events, health, rules, DiagnosticsConfig::default())
}

pub fn engine_with_config(
    events: FakeEventStore,
    health: FakeDeviceHealth,
    rules: FakeAutomationIndex,
    config: DiagnosticsConfig,
) -> TestEngine {
    DiagnosticEngine::new(Arc::new(events), Arc::new(health), Arc::new(rules), config)
}

pub fn snapshot(device_id: &str) -> DeviceSnapshot {
    DeviceSnapshot {
        id: device_id.to_string(),
        name: "Hallway Light".to_string(),
        manufacturer: None,
        online: true,
        battery_level: None,
        last_seen: Some(Utc::now()),
    }
}

pub fn event(
    device_id: &str,
    attribute: &str,
    value: &str,
    ago: ChronoDuration,
    source: EventSource,
) -> Event {
    Event {
        device_id: device_id.to_string(),
        capability: attribute.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
        timestamp: Utc::now() - ago,
        source,
    }
}

pub fn rule_ref(device_id: &str, rule_id: &str, name: &str, role: RuleRole) -> AutomationRuleRef {
    AutomationRuleRef {
        rule_id: rule_id.to_string(),
        name: name.to_string(),
        role,
        device_id: device_id.to_string(),
    }
}
