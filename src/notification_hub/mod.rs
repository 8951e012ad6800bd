//! NotificationHub - Derived-state change distribution
//!
//! ## Responsibilities
//!
//! - Presentation client registration (one unbounded channel per client)
//! - Broadcasting [`StateChange`] notifications produced by the dispatch loop
//!
//! Note: notifications say WHAT changed. Clients needing the full picture read
//! the latest `ConsoleSnapshot` from the console handle.

use crate::call_registry::CallRecord;
use crate::camera_status_tracker::{CameraConnectionStatus, CameraStatusEvent};
use crate::focus_correlator::FocusState;
use crate::intervention::InterventionView;
use crate::router::{ConsoleAlert, EngineStatusBoard};
use crate::zone_alerts::ZoneAlert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Derived-state change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum StateChange {
    /// New entry in the unified alert log
    AlertRaised(ConsoleAlert),
    ZoneAlertUpserted(ZoneAlert),
    ZoneAlertCleared(ZoneAlertClearedMessage),
    FocusChanged(FocusState),
    InterventionChanged(InterventionView),
    /// Once per tick for every coordinator counting down
    CountdownTick(CountdownTickMessage),
    CameraStatus(CameraStatusMessage),
    EngineStatus(EngineStatusBoard),
    CallUpdated(CallUpdatedMessage),
    SessionReset(SessionResetMessage),
}

impl StateChange {
    pub fn type_name(&self) -> &'static str {
        match self {
            StateChange::AlertRaised(_) => "alert_raised",
            StateChange::ZoneAlertUpserted(_) => "zone_alert_upserted",
            StateChange::ZoneAlertCleared(_) => "zone_alert_cleared",
            StateChange::FocusChanged(_) => "focus_changed",
            StateChange::InterventionChanged(_) => "intervention_changed",
            StateChange::CountdownTick(_) => "countdown_tick",
            StateChange::CameraStatus(_) => "camera_status",
            StateChange::EngineStatus(_) => "engine_status",
            StateChange::CallUpdated(_) => "call_updated",
            StateChange::SessionReset(_) => "session_reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAlertClearedMessage {
    pub zone_id: String,
    pub alert_id: String,
}

/// Countdown tick message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownTickMessage {
    pub subject_id: String,
    pub request_id: String,
    /// Seconds until auto-escalation (rounded up)
    pub seconds_remaining: u64,
    /// Full countdown length in seconds
    pub total_sec: u64,
}

/// Camera status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStatusMessage {
    pub camera_id: String,
    pub status: CameraConnectionStatus,
    /// Set when the report changed the connection state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<CameraStatusEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    Started,
    Transcript,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallUpdatedMessage {
    pub phase: CallPhase,
    pub call: CallRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResetMessage {
    pub reset_at: DateTime<Utc>,
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    client_name: String,
    tx: mpsc::UnboundedSender<String>,
}

/// NotificationHub instance
pub struct NotificationHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new client. Messages arrive as serialized JSON.
    pub async fn register(&self, client_name: &str) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let conn = ClientConnection {
            id,
            client_name: client_name.to_string(),
            tx,
        };

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, client = %client_name, "Client connected");

        (id, rx)
    }

    /// Unregister a client
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.remove(id) {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, client = %conn.client_name, "Client disconnected");
        }
    }

    /// Broadcast message to all clients.
    ///
    /// Clients whose receiver was dropped are unregistered.
    pub async fn broadcast(&self, message: &StateChange) {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let dead: Vec<Uuid> = {
            let connections = self.connections.read().await;
            tracing::trace!(
                message_type = %message.type_name(),
                client_count = connections.len(),
                "Broadcasting message to clients"
            );

            connections
                .values()
                .filter_map(|conn| match conn.tx.send(json.clone()) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(connection_id = %conn.id, error = %e, "Failed to send message");
                        Some(conn.id)
                    }
                })
                .collect()
        };

        for id in dead {
            self.unregister(&id).await;
        }
    }

    /// Broadcast a batch in order
    pub async fn broadcast_all(&self, messages: &[StateChange]) {
        for message in messages {
            self.broadcast(message).await;
        }
    }

    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
