//! SessionStats - Running counters for the console session
//!
//! ## Responsibilities
//!
//! - One increment per event category, bumped by the router
//! - Point-in-time value copies for readers
//! - Counters only grow until an explicit session reset

use crate::intervention::TakeoverOrigin;
use crate::models::{EventKind, ThreatLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-severity counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounts {
    fn bump(&mut self, level: ThreatLevel) {
        match level {
            ThreatLevel::Low => self.low += 1,
            ThreatLevel::Medium => self.medium += 1,
            ThreatLevel::High => self.high += 1,
            ThreatLevel::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, level: ThreatLevel) -> u64 {
        match level {
            ThreatLevel::Low => self.low,
            ThreatLevel::Medium => self.medium,
            ThreatLevel::High => self.high,
            ThreatLevel::Critical => self.critical,
        }
    }

    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high + self.critical
    }
}

/// Session statistics (value type)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_started_at: Option<DateTime<Utc>>,
    pub events_total: u64,
    pub events_by_kind: BTreeMap<String, u64>,
    pub unrecognized_events: u64,

    pub detections_total: u64,
    pub detections_by_type: BTreeMap<String, u64>,
    pub known_persons: u64,
    pub unknown_persons: u64,

    pub alerts_by_severity: SeverityCounts,
    pub visual_alerts_by_level: SeverityCounts,
    pub audio_alerts_by_level: SeverityCounts,
    pub threat_alerts_by_level: SeverityCounts,
    pub peak_active_zone_alerts: u64,

    pub face_detections: u64,
    pub face_matches: u64,
    pub face_alerts_recommended: u64,
    pub face_alerts: u64,
    pub persons_recognized: u64,
    pub blacklist_alerts: u64,
    pub vip_detections: u64,

    pub cameras_lost: u64,
    pub cameras_recovered: u64,
    pub engine_status_reports: u64,

    pub calls_started: u64,
    pub calls_ended: u64,
    pub transcript_updates: u64,

    pub interventions_requested: u64,
    /// Requests raised by the console itself (low-confidence streaks)
    pub interventions_auto_raised: u64,
    pub interventions_resolved: u64,
    pub vetoes: u64,
    pub manual_takeovers: u64,
    pub auto_takeovers: u64,
    pub returns_to_standby: u64,

    pub focus_switches: u64,
}

/// Counter accumulator owned by the router
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    stats: SessionStats,
}

impl StatsAccumulator {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            stats: SessionStats {
                session_started_at: Some(now),
                ..Default::default()
            },
        }
    }

    /// Value copy; readers never see a half-applied update
    pub fn snapshot(&self) -> SessionStats {
        self.stats.clone()
    }

    /// Explicit session reset, the only operation that lowers counters
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.stats = SessionStats {
            session_started_at: Some(now),
            ..Default::default()
        };
        tracing::info!("Session statistics reset");
    }

    pub fn record_event(&mut self, kind: EventKind) {
        self.stats.events_total += 1;
        *self
            .stats
            .events_by_kind
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn record_unrecognized(&mut self) {
        self.stats.unrecognized_events += 1;
    }

    pub fn record_detection(&mut self, object_type: &str, is_known_person: Option<bool>) {
        self.stats.detections_total += 1;
        *self
            .stats
            .detections_by_type
            .entry(object_type.to_lowercase())
            .or_insert(0) += 1;
        match is_known_person {
            Some(true) => self.stats.known_persons += 1,
            Some(false) => self.stats.unknown_persons += 1,
            None => {}
        }
    }

    /// Unified alert log severity counter
    pub fn record_alert(&mut self, severity: ThreatLevel) {
        self.stats.alerts_by_severity.bump(severity);
    }

    pub fn record_visual_alert(&mut self, level: ThreatLevel, active_zones: usize) {
        self.stats.visual_alerts_by_level.bump(level);
        self.record_active_zones(active_zones);
    }

    pub fn record_audio_alert(&mut self, level: ThreatLevel) {
        self.stats.audio_alerts_by_level.bump(level);
    }

    pub fn record_threat_alert(&mut self, level: ThreatLevel, active_zones: usize) {
        self.stats.threat_alerts_by_level.bump(level);
        self.record_active_zones(active_zones);
    }

    fn record_active_zones(&mut self, active_zones: usize) {
        self.stats.peak_active_zone_alerts =
            self.stats.peak_active_zone_alerts.max(active_zones as u64);
    }

    pub fn record_face_event(&mut self, matched: bool, alert_recommended: bool) {
        self.stats.face_detections += 1;
        if matched {
            self.stats.face_matches += 1;
        }
        if alert_recommended {
            self.stats.face_alerts_recommended += 1;
        }
    }

    pub fn record_face_alert(&mut self) {
        self.stats.face_alerts += 1;
    }

    pub fn record_person_recognized(&mut self, known: bool) {
        self.stats.persons_recognized += 1;
        if known {
            self.stats.known_persons += 1;
        } else {
            self.stats.unknown_persons += 1;
        }
    }

    pub fn record_blacklist_alert(&mut self) {
        self.stats.blacklist_alerts += 1;
    }

    pub fn record_vip_detection(&mut self) {
        self.stats.vip_detections += 1;
    }

    pub fn record_camera_transition(&mut self, lost: bool) {
        if lost {
            self.stats.cameras_lost += 1;
        } else {
            self.stats.cameras_recovered += 1;
        }
    }

    pub fn record_engine_status(&mut self) {
        self.stats.engine_status_reports += 1;
    }

    pub fn record_call_started(&mut self) {
        self.stats.calls_started += 1;
    }

    pub fn record_call_ended(&mut self) {
        self.stats.calls_ended += 1;
    }

    pub fn record_transcript_update(&mut self) {
        self.stats.transcript_updates += 1;
    }

    pub fn record_intervention_requested(&mut self, auto_raised: bool) {
        self.stats.interventions_requested += 1;
        if auto_raised {
            self.stats.interventions_auto_raised += 1;
        }
    }

    pub fn record_intervention_resolved(&mut self) {
        self.stats.interventions_resolved += 1;
    }

    pub fn record_veto(&mut self) {
        self.stats.vetoes += 1;
    }

    pub fn record_takeover(&mut self, origin: TakeoverOrigin) {
        match origin {
            TakeoverOrigin::Manual => self.stats.manual_takeovers += 1,
            TakeoverOrigin::Auto => self.stats.auto_takeovers += 1,
        }
    }

    pub fn record_return_to_standby(&mut self) {
        self.stats.returns_to_standby += 1;
    }

    pub fn record_focus_switch(&mut self) {
        self.stats.focus_switches += 1;
    }
}
