//! ZoneAlertTable - One live visual alert per zone
//!
//! ## Responsibilities
//!
//! - Keep the current overlay alert for each zone
//! - Replace (never merge) the zone's alert when a newer one arrives
//! - Track the high-water mark of simultaneously active zones

use crate::models::ThreatLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Active alert for a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAlert {
    pub zone_id: String,
    pub alert_id: String,
    pub threat_level: ThreatLevel,
    pub threat_type: String,
    pub description: String,
    pub confidence: f64,
    pub camera_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ZoneAlert {
    /// `alert_<zone>_<epoch millis>`
    pub fn make_alert_id(zone_id: &str, at: DateTime<Utc>) -> String {
        format!("alert_{}_{}", zone_id, at.timestamp_millis())
    }
}

/// Keyed store, zone_id -> alert
#[derive(Debug, Clone, Default)]
pub struct ZoneAlertTable {
    alerts: HashMap<String, ZoneAlert>,
    peak_len: usize,
}

impl ZoneAlertTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the zone's alert. Returns the superseded alert.
    pub fn upsert(&mut self, zone_id: &str, mut alert: ZoneAlert) -> Option<ZoneAlert> {
        alert.zone_id = zone_id.to_string();
        let previous = self.alerts.insert(zone_id.to_string(), alert);
        self.peak_len = self.peak_len.max(self.alerts.len());

        match &previous {
            Some(prev) => tracing::debug!(
                zone_id = %zone_id,
                replaced_alert_id = %prev.alert_id,
                "Zone alert replaced"
            ),
            None => tracing::debug!(zone_id = %zone_id, "Zone alert added"),
        }

        previous
    }

    pub fn remove(&mut self, zone_id: &str) -> Option<ZoneAlert> {
        self.alerts.remove(zone_id)
    }

    /// Remove every alert, returning how many were active
    pub fn clear(&mut self) -> usize {
        let cleared = self.alerts.len();
        self.alerts.clear();
        cleared
    }

    pub fn get(&self, zone_id: &str) -> Option<&ZoneAlert> {
        self.alerts.get(zone_id)
    }

    /// Copy of all alerts, newest first (ties by zone id)
    pub fn snapshot(&self) -> Vec<ZoneAlert> {
        let mut alerts: Vec<ZoneAlert> = self.alerts.values().cloned().collect();
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.zone_id.cmp(&b.zone_id))
        });
        alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Most zones that were simultaneously active
    pub fn peak_len(&self) -> usize {
        self.peak_len
    }
}
