//! Camera Status Tracker
//!
//! Tracks camera connection status reports and surfaces only transitions
//! (lost / recovered) so repeated status heartbeats don't spam the alert log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Camera connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraConnectionStatus {
    /// Never reported
    Unknown,
    Online,
    Offline,
}

/// Camera status transition event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatusEvent {
    /// Online -> Offline, or first report is Offline
    Lost,
    /// Offline -> Online
    Recovered,
}

/// Per-camera status row for snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStatusEntry {
    pub camera_id: String,
    pub status: CameraConnectionStatus,
    /// Raw status string from the last report
    pub reported_status: String,
    pub updated_at: DateTime<Utc>,
}

/// Tracks camera connection status and detects transitions
#[derive(Debug, Clone, Default)]
pub struct CameraStatusTracker {
    /// camera_id -> entry
    statuses: HashMap<String, CameraStatusEntry>,
}

impl CameraStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update camera status and return the transition, if any
    ///
    /// - `Some(Lost)` for Online -> Offline and for an initial Offline report
    /// - `Some(Recovered)` for Offline -> Online
    /// - `None` otherwise (including the first Online report)
    pub fn update_status(
        &mut self,
        camera_id: &str,
        is_online: bool,
        reported_status: &str,
        now: DateTime<Utc>,
    ) -> Option<CameraStatusEvent> {
        let prev = self.get_status(camera_id);
        let new_status = if is_online {
            CameraConnectionStatus::Online
        } else {
            CameraConnectionStatus::Offline
        };

        self.statuses.insert(
            camera_id.to_string(),
            CameraStatusEntry {
                camera_id: camera_id.to_string(),
                status: new_status,
                reported_status: reported_status.to_string(),
                updated_at: now,
            },
        );

        match (prev, new_status) {
            (CameraConnectionStatus::Online, CameraConnectionStatus::Offline) => {
                tracing::warn!(camera_id = %camera_id, "Camera connection lost");
                Some(CameraStatusEvent::Lost)
            }
            (CameraConnectionStatus::Offline, CameraConnectionStatus::Online) => {
                tracing::info!(camera_id = %camera_id, "Camera connection recovered");
                Some(CameraStatusEvent::Recovered)
            }
            (CameraConnectionStatus::Unknown, CameraConnectionStatus::Offline) => {
                tracing::warn!(
                    camera_id = %camera_id,
                    "Camera first reported offline - marking as lost"
                );
                Some(CameraStatusEvent::Lost)
            }
            _ => None,
        }
    }

    pub fn get_status(&self, camera_id: &str) -> CameraConnectionStatus {
        self.statuses
            .get(camera_id)
            .map(|e| e.status)
            .unwrap_or(CameraConnectionStatus::Unknown)
    }

    /// Offline camera ids, sorted
    pub fn get_offline_cameras(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .statuses
            .values()
            .filter(|e| e.status == CameraConnectionStatus::Offline)
            .map(|e| e.camera_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// All tracked cameras, sorted by id
    pub fn snapshot(&self) -> Vec<CameraStatusEntry> {
        let mut entries: Vec<CameraStatusEntry> = self.statuses.values().cloned().collect();
        entries.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        entries
    }
}
