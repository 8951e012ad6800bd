//! Inbound event taxonomy
//!
//! Every message entering the console is an [`EventEnvelope`] whose payload is
//! one variant of the closed [`EventPayload`] union. The kind is derived from the
//! payload variant, so handlers are checked for exhaustiveness at compile time.
//!
//! Wire format:
//!
//! ```json
//! {"source_id": "engine-1", "camera_id": "cam-3", "occurred_at": "2026-01-01T00:00:00Z",
//!  "event": {"type": "visual_alert", "data": {"zone_id": "lobby", ...}}}
//! ```

use super::threat::{deserialize_lenient, PersonType, ThreatLevel};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of inbound event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Detection,
    Alert,
    CameraStatus,
    VisualAlert,
    AudioAlert,
    FaceDetection,
    FaceAlert,
    PersonRecognized,
    BlacklistAlert,
    VipDetection,
    CallStarted,
    CallEnded,
    CallTranscriptUpdate,
    InterventionRequested,
    InterventionResolved,
    ThreatAlert,
    EngineStatus,
}

impl EventKind {
    pub const ALL: [EventKind; 17] = [
        EventKind::Detection,
        EventKind::Alert,
        EventKind::CameraStatus,
        EventKind::VisualAlert,
        EventKind::AudioAlert,
        EventKind::FaceDetection,
        EventKind::FaceAlert,
        EventKind::PersonRecognized,
        EventKind::BlacklistAlert,
        EventKind::VipDetection,
        EventKind::CallStarted,
        EventKind::CallEnded,
        EventKind::CallTranscriptUpdate,
        EventKind::InterventionRequested,
        EventKind::InterventionResolved,
        EventKind::ThreatAlert,
        EventKind::EngineStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Detection => "detection",
            EventKind::Alert => "alert",
            EventKind::CameraStatus => "camera_status",
            EventKind::VisualAlert => "visual_alert",
            EventKind::AudioAlert => "audio_alert",
            EventKind::FaceDetection => "face_detection",
            EventKind::FaceAlert => "face_alert",
            EventKind::PersonRecognized => "person_recognized",
            EventKind::BlacklistAlert => "blacklist_alert",
            EventKind::VipDetection => "vip_detection",
            EventKind::CallStarted => "call_started",
            EventKind::CallEnded => "call_ended",
            EventKind::CallTranscriptUpdate => "call_transcript_update",
            EventKind::InterventionRequested => "intervention_requested",
            EventKind::InterventionResolved => "intervention_resolved",
            EventKind::ThreatAlert => "threat_alert",
            EventKind::EngineStatus => "engine_status",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownEventKind(s.to_string()))
    }
}

/// Normalized bounding box (x, y, width, height)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPayload {
    #[serde(default)]
    pub camera_id: Option<String>,
    /// Detected object class ("person", "vehicle", ...)
    #[serde(rename = "type")]
    pub object_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub is_known_person: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub threat_level: Option<ThreatLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub severity: ThreatLevel,
    pub message: String,
    #[serde(default)]
    pub camera_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStatusPayload {
    pub camera_id: String,
    /// "online", "offline", "connected", ...
    pub status: String,
}

impl CameraStatusPayload {
    pub fn is_online(&self) -> bool {
        matches!(
            self.status.trim().to_lowercase().as_str(),
            "online" | "connected" | "active" | "streaming"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAlertPayload {
    #[serde(default)]
    pub zone_id: Option<String>,
    pub threat_level: ThreatLevel,
    pub threat_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub camera_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAlertPayload {
    #[serde(default)]
    pub zone_id: Option<String>,
    pub threat_type: String,
    pub threat_level: ThreatLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetectionPayload {
    #[serde(default)]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub person_type: PersonType,
    pub confidence: f64,
    #[serde(default)]
    pub is_match: bool,
    #[serde(default)]
    pub face_location: Option<BoundingBox>,
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default)]
    pub alert_recommended: bool,
}

/// Person block attached to a face alert
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FacePersonData {
    #[serde(default)]
    pub face_id: Option<String>,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub person_type: PersonType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAlertPayload {
    #[serde(default)]
    pub person_data: FacePersonData,
    #[serde(default)]
    pub camera_id: Option<String>,
    pub priority: ThreatLevel,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecognizedPayload {
    pub face_id: String,
    pub person_name: String,
    #[serde(default)]
    pub person_type: PersonType,
    #[serde(default)]
    pub camera_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistAlertPayload {
    pub person_name: String,
    #[serde(default)]
    pub camera_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipDetectionPayload {
    pub person_name: String,
    #[serde(default)]
    pub camera_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStartedPayload {
    pub call_id: String,
    pub caller_number: String,
    #[serde(default)]
    pub incident_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEndedPayload {
    pub call_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTranscriptUpdatePayload {
    pub call_id: String,
    pub transcript: String,
    pub ai_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRequestedPayload {
    pub request_id: String,
    /// Call or interaction the request concerns
    pub subject_id: String,
    pub reason: String,
    #[serde(default)]
    pub ai_confidence: f64,
    #[serde(default)]
    pub situation_type: String,
    #[serde(default)]
    pub priority: ThreatLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResolvedPayload {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAlertPayload {
    pub alert_type: String,
    pub threat_level: ThreatLevel,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub engines_triggered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatusPayload {
    pub connected: bool,
    #[serde(default)]
    pub engines: BTreeMap<String, bool>,
}

/// Kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Detection(DetectionPayload),
    Alert(AlertPayload),
    CameraStatus(CameraStatusPayload),
    VisualAlert(VisualAlertPayload),
    AudioAlert(AudioAlertPayload),
    FaceDetection(FaceDetectionPayload),
    FaceAlert(FaceAlertPayload),
    PersonRecognized(PersonRecognizedPayload),
    BlacklistAlert(BlacklistAlertPayload),
    VipDetection(VipDetectionPayload),
    CallStarted(CallStartedPayload),
    CallEnded(CallEndedPayload),
    CallTranscriptUpdate(CallTranscriptUpdatePayload),
    InterventionRequested(InterventionRequestedPayload),
    InterventionResolved(InterventionResolvedPayload),
    ThreatAlert(ThreatAlertPayload),
    EngineStatus(EngineStatusPayload),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Detection(_) => EventKind::Detection,
            EventPayload::Alert(_) => EventKind::Alert,
            EventPayload::CameraStatus(_) => EventKind::CameraStatus,
            EventPayload::VisualAlert(_) => EventKind::VisualAlert,
            EventPayload::AudioAlert(_) => EventKind::AudioAlert,
            EventPayload::FaceDetection(_) => EventKind::FaceDetection,
            EventPayload::FaceAlert(_) => EventKind::FaceAlert,
            EventPayload::PersonRecognized(_) => EventKind::PersonRecognized,
            EventPayload::BlacklistAlert(_) => EventKind::BlacklistAlert,
            EventPayload::VipDetection(_) => EventKind::VipDetection,
            EventPayload::CallStarted(_) => EventKind::CallStarted,
            EventPayload::CallEnded(_) => EventKind::CallEnded,
            EventPayload::CallTranscriptUpdate(_) => EventKind::CallTranscriptUpdate,
            EventPayload::InterventionRequested(_) => EventKind::InterventionRequested,
            EventPayload::InterventionResolved(_) => EventKind::InterventionResolved,
            EventPayload::ThreatAlert(_) => EventKind::ThreatAlert,
            EventPayload::EngineStatus(_) => EventKind::EngineStatus,
        }
    }
}

/// Immutable inbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    source_id: String,
    #[serde(default)]
    zone_id: Option<String>,
    #[serde(default)]
    camera_id: Option<String>,
    occurred_at: DateTime<Utc>,
    #[serde(rename = "event")]
    payload: EventPayload,
}

impl EventEnvelope {
    pub fn new(source_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            source_id: source_id.into(),
            zone_id: None,
            camera_id: None,
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn with_camera(mut self, camera_id: impl Into<String>) -> Self {
        self.camera_id = Some(camera_id.into());
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn occurred_at_time(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Decode a wire envelope.
    ///
    /// An event type outside the taxonomy yields [`Error::UnknownEventKind`] so the
    /// transport can log and drop it without confusing it with a malformed payload.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let tag = value
            .get("event")
            .and_then(|e| e.get("type"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Parse("envelope has no event.type".to_string()))?;
        tag.parse::<EventKind>()?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn zone_id(&self) -> Option<&str> {
        non_empty(self.zone_id.as_deref())
    }

    pub fn camera_id(&self) -> Option<&str> {
        non_empty(self.camera_id.as_deref())
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Payload camera id, falling back to the envelope's routing hint
    pub fn resolve_camera<'a>(&'a self, own: Option<&'a str>) -> Option<&'a str> {
        non_empty(own).or_else(|| self.camera_id())
    }

    /// Payload zone id, falling back to the envelope's routing hint
    pub fn resolve_zone<'a>(&'a self, own: Option<&'a str>) -> Option<&'a str> {
        non_empty(own).or_else(|| self.zone_id())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
