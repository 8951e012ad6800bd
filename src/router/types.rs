//! Router item, command and snapshot types

use crate::call_registry::CallRecord;
use crate::camera_status_tracker::CameraStatusEntry;
use crate::focus_correlator::FocusState;
use crate::intervention::InterventionView;
use crate::models::{
    DetectionPayload, EngineStatusPayload, EventEnvelope, EventKind, FaceAlertPayload,
    FaceDetectionPayload, PersonType, ThreatAlertPayload, ThreatLevel,
};
use crate::session_stats::SessionStats;
use crate::zone_alerts::ZoneAlert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unified alert-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleAlert {
    pub alert_id: String,
    /// Event kind that produced the alert
    pub source: EventKind,
    pub severity: ThreatLevel,
    pub message: String,
    pub camera_id: Option<String>,
    pub zone_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Event payload kept in a view log, with routing metadata resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent<P> {
    pub source_id: String,
    pub camera_id: Option<String>,
    pub zone_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub payload: P,
}

impl<P: Clone> LoggedEvent<P> {
    pub fn new(
        envelope: &EventEnvelope,
        camera_id: Option<&str>,
        zone_id: Option<&str>,
        payload: &P,
    ) -> Self {
        Self {
            source_id: envelope.source_id().to_string(),
            camera_id: camera_id.map(str::to_string),
            zone_id: zone_id.map(str::to_string),
            occurred_at: envelope.occurred_at(),
            payload: payload.clone(),
        }
    }
}

pub type DetectionRecord = LoggedEvent<DetectionPayload>;
pub type FaceDetectionRecord = LoggedEvent<FaceDetectionPayload>;
pub type FaceAlertRecord = LoggedEvent<FaceAlertPayload>;
pub type ThreatAlertRecord = LoggedEvent<ThreatAlertPayload>;

/// Recognized-persons view row, one per face id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedPerson {
    pub face_id: String,
    pub person_name: String,
    pub person_type: PersonType,
    pub camera_id: Option<String>,
    pub recognized_at: DateTime<Utc>,
}

/// Latest AI-engine connectivity report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatusBoard {
    pub connected: bool,
    pub engines: BTreeMap<String, bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EngineStatusBoard {
    /// Replace the board with a new report. Returns true if anything changed.
    pub fn apply(&mut self, report: &EngineStatusPayload, now: DateTime<Utc>) -> bool {
        let changed = self.updated_at.is_none()
            || self.connected != report.connected
            || self.engines != report.engines;
        self.connected = report.connected;
        self.engines = report.engines.clone();
        self.updated_at = Some(now);
        changed
    }

    /// Engines reporting disconnected, sorted
    pub fn offline_engines(&self) -> Vec<String> {
        self.engines
            .iter()
            .filter(|(_, up)| !**up)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Operator action, routed through the same queue as events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OperatorCommand {
    /// Operator asks for human handling of an interaction
    RequestIntervention {
        subject_id: String,
        reason: String,
        #[serde(default)]
        situation_type: String,
        #[serde(default)]
        priority: ThreatLevel,
    },
    Veto {
        subject_id: String,
    },
    Takeover {
        subject_id: String,
    },
    ReturnToStandby {
        subject_id: String,
    },
    PinFocus {
        camera_id: String,
    },
    UnpinFocus,
    ClearZone {
        zone_id: String,
    },
    ClearAllZones,
    ResetSession,
}

/// Immutable point-in-time view of everything the console shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleSnapshot {
    pub taken_at: DateTime<Utc>,
    pub detections: Vec<DetectionRecord>,
    pub alerts: Vec<ConsoleAlert>,
    pub face_detections: Vec<FaceDetectionRecord>,
    pub face_alerts: Vec<FaceAlertRecord>,
    pub threat_alerts: Vec<ThreatAlertRecord>,
    pub recognized_persons: Vec<RecognizedPerson>,
    pub alert_history: Vec<ZoneAlert>,
    pub zone_alerts: Vec<ZoneAlert>,
    pub stats: SessionStats,
    pub focus: FocusState,
    pub interventions: Vec<InterventionView>,
    pub calls: Vec<CallRecord>,
    pub cameras: Vec<CameraStatusEntry>,
    pub engine_status: EngineStatusBoard,
}

impl ConsoleSnapshot {
    pub fn intervention(&self, subject_id: &str) -> Option<&InterventionView> {
        self.interventions.iter().find(|v| v.subject_id == subject_id)
    }
}
