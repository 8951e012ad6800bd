//! FocusCorrelator - "Which camera should the operator look at now"
//!
//! ## Responsibilities
//!
//! - Switch focus to a camera raising a severe enough alert
//! - Respect a manual pin set by the operator
//! - Avoid flapping: equal severity keeps the current focus until it goes stale

use crate::models::ThreatLevel;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Focus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    #[default]
    Auto,
    /// Operator pinned a camera; automatic switching is suspended
    Pinned,
}

/// Current focus (shared by all operator views)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FocusState {
    pub camera_id: Option<String>,
    pub zone_id: Option<String>,
    pub severity: Option<ThreatLevel>,
    pub mode: FocusMode,
    pub since: Option<DateTime<Utc>>,
}

/// Focus switching policy
#[derive(Debug, Clone)]
pub struct FocusPolicy {
    /// Minimum severity that may pull focus
    pub threshold: ThreatLevel,
    /// After this long an auto focus no longer blocks equal/lower candidates
    pub hold: Duration,
}

impl Default for FocusPolicy {
    fn default() -> Self {
        Self {
            threshold: ThreatLevel::High,
            hold: Duration::seconds(30),
        }
    }
}

/// FocusCorrelator instance
#[derive(Debug, Clone)]
pub struct FocusCorrelator {
    state: FocusState,
    policy: FocusPolicy,
    known_cameras: HashSet<String>,
}

impl FocusCorrelator {
    pub fn new(policy: FocusPolicy) -> Self {
        Self {
            state: FocusState::default(),
            policy,
            known_cameras: HashSet::new(),
        }
    }

    /// Make a camera eligible for focus
    pub fn register_camera(&mut self, camera_id: &str) -> bool {
        if camera_id.trim().is_empty() {
            return false;
        }
        self.known_cameras.insert(camera_id.to_string())
    }

    pub fn is_known(&self, camera_id: &str) -> bool {
        self.known_cameras.contains(camera_id)
    }

    pub fn current_focus(&self) -> FocusState {
        self.state.clone()
    }

    /// Consider a new alert/threat. Returns true when focus moved to another camera.
    pub fn consider(
        &mut self,
        camera_id: &str,
        zone_id: Option<&str>,
        severity: ThreatLevel,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_known(camera_id) {
            tracing::trace!(camera_id = %camera_id, "Focus candidate ignored, unknown camera");
            return false;
        }
        if self.state.mode == FocusMode::Pinned {
            return false;
        }
        if severity < self.policy.threshold {
            return false;
        }

        // Same camera: refresh, not a switch
        if self.state.camera_id.as_deref() == Some(camera_id) {
            if self.state.severity.map(|s| severity >= s).unwrap_or(true) {
                self.state.severity = Some(severity);
                self.state.zone_id = zone_id.map(str::to_string);
            }
            self.state.since = Some(now);
            return false;
        }

        let should_switch = match (self.state.severity, self.state.since) {
            (Some(current), Some(since)) => {
                let stale = now - since > self.policy.hold;
                // Ties favor the existing focus
                severity > current || stale
            }
            _ => true,
        };

        if should_switch {
            tracing::info!(
                from = ?self.state.camera_id,
                to = %camera_id,
                severity = %severity,
                "Focus switched"
            );
            self.state = FocusState {
                camera_id: Some(camera_id.to_string()),
                zone_id: zone_id.map(str::to_string),
                severity: Some(severity),
                mode: FocusMode::Auto,
                since: Some(now),
            };
        }

        should_switch
    }

    /// Pin focus to a camera. Unknown cameras are ignored.
    pub fn pin(&mut self, camera_id: &str, now: DateTime<Utc>) -> bool {
        if !self.is_known(camera_id) {
            tracing::debug!(camera_id = %camera_id, "Pin ignored, unknown camera");
            return false;
        }
        self.state = FocusState {
            camera_id: Some(camera_id.to_string()),
            zone_id: None,
            severity: None,
            mode: FocusMode::Pinned,
            since: Some(now),
        };
        tracing::info!(camera_id = %camera_id, "Focus pinned");
        true
    }

    /// Release a manual pin, keeping the camera as the auto focus
    pub fn unpin(&mut self) -> bool {
        if self.state.mode != FocusMode::Pinned {
            return false;
        }
        self.state.mode = FocusMode::Auto;
        tracing::info!("Focus unpinned");
        true
    }

    /// Clear focus (session reset). Known cameras are kept.
    pub fn clear(&mut self) {
        self.state = FocusState::default();
    }
}

impl Default for FocusCorrelator {
    fn default() -> Self {
        Self::new(FocusPolicy::default())
    }
}
