//! Intervention types

use crate::models::{InterventionRequestedPayload, ThreatLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for a human to take over an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRequest {
    pub request_id: String,
    /// Call or interaction id
    pub subject_id: String,
    pub reason: String,
    pub ai_confidence: f64,
    pub situation_type: String,
    pub priority: ThreatLevel,
    pub requested_at: DateTime<Utc>,
}

impl InterventionRequest {
    pub fn from_payload(payload: &InterventionRequestedPayload, now: DateTime<Utc>) -> Self {
        Self {
            request_id: payload.request_id.clone(),
            subject_id: payload.subject_id.clone(),
            reason: payload.reason.clone(),
            ai_confidence: payload.ai_confidence,
            situation_type: payload.situation_type.clone(),
            priority: payload.priority,
            requested_at: now,
        }
    }

    /// Request raised by the console itself or an operator (fresh request id)
    pub fn raised(
        subject_id: &str,
        reason: impl Into<String>,
        ai_confidence: f64,
        situation_type: impl Into<String>,
        priority: ThreatLevel,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            reason: reason.into(),
            ai_confidence,
            situation_type: situation_type.into(),
            priority,
            requested_at: now,
        }
    }
}

/// Coordinator mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionMode {
    /// AI handles the interaction
    Standby,
    /// Waiting for an operator before auto-escalating
    Countdown,
    /// Human in control
    Active,
}

/// How a human took control of an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeoverOrigin {
    /// Operator pressed take over during the countdown
    Manual,
    /// Countdown reached its deadline
    Auto,
}

/// Outcome of a coordinator operation
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Not valid in the current state; nothing changed
    Ignored,
    CountdownStarted {
        request_id: String,
        deadline: DateTime<Utc>,
    },
    Vetoed {
        request_id: String,
    },
    /// Countdown cancelled because the request was resolved upstream
    Resolved {
        request_id: String,
    },
    TookOver {
        request_id: String,
        origin: TakeoverOrigin,
    },
    ReturnedToStandby {
        request_id: String,
    },
}

impl Transition {
    pub fn is_change(&self) -> bool {
        !matches!(self, Transition::Ignored)
    }
}

/// Read-only view of one coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionView {
    pub subject_id: String,
    pub mode: InterventionMode,
    /// Whole seconds left, rounded up (countdown only)
    pub remaining_seconds: Option<u64>,
    pub deadline: Option<DateTime<Utc>>,
    pub request: Option<InterventionRequest>,
    /// Recorded once a human is in control
    pub takeover: Option<TakeoverOrigin>,
}
