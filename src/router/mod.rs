//! ConsoleRouter - Event classification and derived-state maintenance
//!
//! ## Responsibilities
//!
//! - Route each envelope to its kind's handler (exhaustive over the taxonomy)
//! - Maintain view logs, zone alerts, statistics, focus, calls, camera and engine state
//! - Forward call lifecycle and intervention events to the intervention board
//! - Apply operator commands and injected countdown expiries
//!
//! ## Design
//!
//! The router is the single owner of all console state and never blocks.
//! Every mutation returns the [`StateChange`] notifications it caused; the
//! dispatch loop decides how to publish them.

mod logs;
mod types;

pub use logs::ConsoleLogs;
pub use types::*;

use crate::call_registry::{CallRegistry, TranscriptOutcome};
use crate::camera_status_tracker::{CameraStatusEvent, CameraStatusTracker};
use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::focus_correlator::FocusCorrelator;
use crate::intervention::{InterventionBoard, InterventionMode, InterventionRequest, Transition};
use crate::models::*;
use crate::notification_hub::{
    CallPhase, CallUpdatedMessage, CameraStatusMessage, CountdownTickMessage,
    SessionResetMessage, StateChange, ZoneAlertClearedMessage,
};
use crate::session_stats::StatsAccumulator;
use crate::zone_alerts::{ZoneAlert, ZoneAlertTable};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Reason attached to interventions raised from transcript confidence
pub const LOW_CONFIDENCE_REASON: &str = "Multiple low-confidence transcriptions";

/// ConsoleRouter instance
pub struct ConsoleRouter {
    clock: Arc<dyn Clock>,
    logs: ConsoleLogs,
    zones: ZoneAlertTable,
    stats: StatsAccumulator,
    focus: FocusCorrelator,
    interventions: InterventionBoard,
    cameras: CameraStatusTracker,
    calls: CallRegistry,
    engines: EngineStatusBoard,
}

impl ConsoleRouter {
    pub fn new(config: &CoordinatorConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut focus = FocusCorrelator::new(config.focus_policy());
        for camera_id in &config.known_cameras {
            focus.register_camera(camera_id);
        }

        Self {
            clock,
            logs: ConsoleLogs::new(&config.log_capacities),
            zones: ZoneAlertTable::new(),
            stats: StatsAccumulator::new(now),
            focus,
            interventions: InterventionBoard::new(config.countdown()),
            cameras: CameraStatusTracker::new(),
            calls: CallRegistry::new(config.escalation_policy()),
            engines: EngineStatusBoard::default(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Route one event. Never fails; missing correlation data skips the dependent step.
    pub fn dispatch(&mut self, envelope: &EventEnvelope) -> Vec<StateChange> {
        let now = self.clock.now();
        let kind = envelope.kind();
        self.stats.record_event(kind);
        tracing::debug!(kind = %kind, source_id = %envelope.source_id(), "Dispatching event");

        let mut changes = Vec::new();
        match envelope.payload() {
            EventPayload::Detection(p) => self.on_detection(envelope, p, now, &mut changes),
            EventPayload::Alert(p) => self.on_alert(envelope, p, now, &mut changes),
            EventPayload::CameraStatus(p) => self.on_camera_status(p, now, &mut changes),
            EventPayload::VisualAlert(p) => self.on_visual_alert(envelope, p, now, &mut changes),
            EventPayload::AudioAlert(p) => self.on_audio_alert(envelope, p, now, &mut changes),
            EventPayload::FaceDetection(p) => {
                self.on_face_detection(envelope, p, now, &mut changes)
            }
            EventPayload::FaceAlert(p) => self.on_face_alert(envelope, p, now, &mut changes),
            EventPayload::PersonRecognized(p) => {
                self.on_person_recognized(envelope, p, now, &mut changes)
            }
            EventPayload::BlacklistAlert(p) => {
                self.on_blacklist_alert(envelope, p, now, &mut changes)
            }
            EventPayload::VipDetection(p) => self.on_vip_detection(envelope, p, now, &mut changes),
            EventPayload::CallStarted(p) => self.on_call_started(p, now, &mut changes),
            EventPayload::CallEnded(p) => self.on_call_ended(p, &mut changes),
            EventPayload::CallTranscriptUpdate(p) => {
                self.on_transcript_update(p, now, &mut changes)
            }
            EventPayload::InterventionRequested(p) => {
                let request = InterventionRequest::from_payload(p, now);
                self.request_intervention(request, false, now, &mut changes);
            }
            EventPayload::InterventionResolved(p) => {
                self.on_intervention_resolved(p, now, &mut changes)
            }
            EventPayload::ThreatAlert(p) => self.on_threat_alert(envelope, p, now, &mut changes),
            EventPayload::EngineStatus(p) => self.on_engine_status(p, now, &mut changes),
        }
        changes
    }

    /// Count an envelope whose kind is outside the taxonomy
    pub fn record_unrecognized(&mut self, detail: &str) {
        self.stats.record_unrecognized();
        tracing::warn!(detail = %detail, "Unrecognized event dropped");
    }

    pub fn apply(&mut self, command: OperatorCommand) -> Vec<StateChange> {
        let now = self.clock.now();
        let mut changes = Vec::new();
        tracing::debug!(command = ?command, "Applying operator command");

        match command {
            OperatorCommand::RequestIntervention {
                subject_id,
                reason,
                situation_type,
                priority,
            } => {
                // Operator-raised requests carry no AI confidence
                let request =
                    InterventionRequest::raised(&subject_id, reason, 0.0, situation_type, priority, now);
                self.request_intervention(request, false, now, &mut changes);
            }
            OperatorCommand::Veto { subject_id } => {
                let t = self.interventions.veto(&subject_id);
                self.note_transition(&subject_id, t, now, &mut changes);
            }
            OperatorCommand::Takeover { subject_id } => {
                let t = self.interventions.takeover(&subject_id);
                self.note_transition(&subject_id, t, now, &mut changes);
            }
            OperatorCommand::ReturnToStandby { subject_id } => {
                let t = self.interventions.return_to_standby(&subject_id);
                self.note_transition(&subject_id, t, now, &mut changes);
            }
            OperatorCommand::PinFocus { camera_id } => {
                if self.focus.pin(&camera_id, now) {
                    changes.push(StateChange::FocusChanged(self.focus.current_focus()));
                }
            }
            OperatorCommand::UnpinFocus => {
                if self.focus.unpin() {
                    changes.push(StateChange::FocusChanged(self.focus.current_focus()));
                }
            }
            OperatorCommand::ClearZone { zone_id } => {
                if let Some(alert) = self.zones.remove(&zone_id) {
                    changes.push(StateChange::ZoneAlertCleared(ZoneAlertClearedMessage {
                        zone_id: alert.zone_id,
                        alert_id: alert.alert_id,
                    }));
                }
            }
            OperatorCommand::ClearAllZones => {
                let cleared = self.zones.snapshot();
                self.zones.clear();
                changes.extend(cleared.into_iter().map(|alert| {
                    StateChange::ZoneAlertCleared(ZoneAlertClearedMessage {
                        zone_id: alert.zone_id,
                        alert_id: alert.alert_id,
                    })
                }));
            }
            OperatorCommand::ResetSession => {
                self.reset_session(now);
                changes.push(StateChange::SessionReset(SessionResetMessage { reset_at: now }));
            }
        }
        changes
    }

    /// Auto-escalate every countdown whose deadline has passed
    pub fn expire_due(&mut self) -> Vec<StateChange> {
        let now = self.clock.now();
        let mut changes = Vec::new();
        for (subject_id, t) in self.interventions.expire_due(now) {
            self.note_transition(&subject_id, t, now, &mut changes);
        }
        changes
    }

    /// One tick notification per coordinator counting down
    pub fn countdown_ticks(&self) -> Vec<StateChange> {
        let now = self.clock.now();
        let total_sec = self.interventions.countdown().num_seconds().max(0) as u64;
        self.interventions
            .views(now)
            .into_iter()
            .filter(|v| v.mode == InterventionMode::Countdown)
            .filter_map(|v| {
                let request_id = v.request.as_ref()?.request_id.clone();
                Some(StateChange::CountdownTick(CountdownTickMessage {
                    subject_id: v.subject_id,
                    request_id,
                    seconds_remaining: v.remaining_seconds.unwrap_or(0),
                    total_sec,
                }))
            })
            .collect()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.interventions.next_deadline()
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        let now = self.clock.now();
        ConsoleSnapshot {
            taken_at: now,
            detections: self.logs.detections.snapshot(),
            alerts: self.logs.alerts.snapshot(),
            face_detections: self.logs.face_detections.snapshot(),
            face_alerts: self.logs.face_alerts.snapshot(),
            threat_alerts: self.logs.threat_alerts.snapshot(),
            recognized_persons: self.logs.recognized_persons.snapshot(),
            alert_history: self.logs.alert_history.snapshot(),
            zone_alerts: self.zones.snapshot(),
            stats: self.stats.snapshot(),
            focus: self.focus.current_focus(),
            interventions: self.interventions.views(now),
            calls: self.calls.snapshot(),
            cameras: self.cameras.snapshot(),
            engine_status: self.engines.clone(),
        }
    }

    // ========================================
    // Event handlers
    // ========================================

    fn on_detection(
        &mut self,
        envelope: &EventEnvelope,
        p: &DetectionPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.zone_id();
        self.logs
            .detections
            .insert(LoggedEvent::new(envelope, camera_id, zone_id, p), now);
        self.stats.record_detection(&p.object_type, p.is_known_person);

        if let Some(level) = p.threat_level {
            self.consider_focus(camera_id, zone_id, level, now, changes);
        }
    }

    fn on_alert(
        &mut self,
        envelope: &EventEnvelope,
        p: &AlertPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.zone_id();
        self.push_alert(
            None,
            EventKind::Alert,
            p.severity,
            p.message.clone(),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, p.severity, now, changes);
    }

    fn on_camera_status(
        &mut self,
        p: &CameraStatusPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let newly_known = self.focus.register_camera(&p.camera_id);
        let transition = self
            .cameras
            .update_status(&p.camera_id, p.is_online(), &p.status, now);

        if let Some(event) = transition {
            let lost = event == CameraStatusEvent::Lost;
            self.stats.record_camera_transition(lost);
            if lost {
                self.push_alert(
                    None,
                    EventKind::CameraStatus,
                    ThreatLevel::Medium,
                    format!("Camera connection lost: {}", p.camera_id),
                    Some(p.camera_id.as_str()),
                    None,
                    now,
                    changes,
                );
            }
        }

        if newly_known || transition.is_some() {
            changes.push(StateChange::CameraStatus(CameraStatusMessage {
                camera_id: p.camera_id.clone(),
                status: self.cameras.get_status(&p.camera_id),
                transition,
            }));
        }
    }

    fn on_visual_alert(
        &mut self,
        envelope: &EventEnvelope,
        p: &VisualAlertPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.resolve_zone(p.zone_id.as_deref());

        let alert_id = zone_id.map(|zone| {
            self.upsert_zone(
                zone,
                ZoneAlert {
                    zone_id: zone.to_string(),
                    alert_id: ZoneAlert::make_alert_id(zone, now),
                    threat_level: p.threat_level,
                    threat_type: p.threat_type.clone(),
                    description: p.description.clone(),
                    confidence: p.confidence,
                    camera_id: camera_id.map(str::to_string),
                    created_at: now,
                },
                now,
                changes,
            )
        });
        self.stats.record_visual_alert(p.threat_level, self.zones.len());

        self.push_alert(
            alert_id,
            EventKind::VisualAlert,
            p.threat_level,
            describe(&p.threat_type, &p.description),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, p.threat_level, now, changes);
    }

    fn on_audio_alert(
        &mut self,
        envelope: &EventEnvelope,
        p: &AudioAlertPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.camera_id();
        let zone_id = envelope.resolve_zone(p.zone_id.as_deref());
        self.stats.record_audio_alert(p.threat_level);
        self.push_alert(
            None,
            EventKind::AudioAlert,
            p.threat_level,
            format!("Audio threat: {}", p.threat_type),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, p.threat_level, now, changes);
    }

    fn on_face_detection(
        &mut self,
        envelope: &EventEnvelope,
        p: &FaceDetectionPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.zone_id();
        self.logs
            .face_detections
            .insert(LoggedEvent::new(envelope, camera_id, zone_id, p), now);
        self.stats.record_face_event(p.is_match, p.alert_recommended);

        let severity = if p.alert_recommended {
            ThreatLevel::High
        } else {
            ThreatLevel::Low
        };
        self.consider_focus(camera_id, zone_id, severity, now, changes);
    }

    fn on_face_alert(
        &mut self,
        envelope: &EventEnvelope,
        p: &FaceAlertPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.zone_id();
        self.logs
            .face_alerts
            .insert(LoggedEvent::new(envelope, camera_id, zone_id, p), now);
        self.stats.record_face_alert();

        self.push_alert(
            None,
            EventKind::FaceAlert,
            p.priority,
            p.message.clone(),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, p.priority, now, changes);
    }

    fn on_person_recognized(
        &mut self,
        envelope: &EventEnvelope,
        p: &PersonRecognizedPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let person = RecognizedPerson {
            face_id: p.face_id.clone(),
            person_name: p.person_name.clone(),
            person_type: p.person_type,
            camera_id: camera_id.map(str::to_string),
            recognized_at: now,
        };
        if self
            .logs
            .recognized_persons
            .insert_replacing(person, now, |r| r.face_id.clone())
            .is_some()
        {
            tracing::trace!(face_id = %p.face_id, "Recognized person refreshed");
        }
        self.stats.record_person_recognized(p.person_type.is_known());

        let severity = if p.person_type == PersonType::Blacklist {
            ThreatLevel::High
        } else {
            ThreatLevel::Low
        };
        self.consider_focus(camera_id, envelope.zone_id(), severity, now, changes);
    }

    fn on_blacklist_alert(
        &mut self,
        envelope: &EventEnvelope,
        p: &BlacklistAlertPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.zone_id();
        self.stats.record_blacklist_alert();
        self.push_alert(
            None,
            EventKind::BlacklistAlert,
            ThreatLevel::High,
            format!("Blacklisted person detected: {}", p.person_name),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, ThreatLevel::High, now, changes);
    }

    fn on_vip_detection(
        &mut self,
        envelope: &EventEnvelope,
        p: &VipDetectionPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.zone_id();
        self.stats.record_vip_detection();
        self.push_alert(
            None,
            EventKind::VipDetection,
            ThreatLevel::Low,
            format!("VIP detected: {}", p.person_name),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, ThreatLevel::Low, now, changes);
    }

    fn on_call_started(
        &mut self,
        p: &CallStartedPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let call = self
            .calls
            .start(&p.call_id, &p.caller_number, p.incident_type.as_deref(), now);
        self.stats.record_call_started();
        tracing::info!(call_id = %p.call_id, caller = %p.caller_number, "Call started");

        changes.push(StateChange::CallUpdated(CallUpdatedMessage {
            phase: CallPhase::Started,
            call,
        }));
        if self.interventions.open(&p.call_id) {
            if let Some(view) = self.interventions.view(&p.call_id, now) {
                changes.push(StateChange::InterventionChanged(view));
            }
        }
    }

    fn on_call_ended(&mut self, p: &CallEndedPayload, changes: &mut Vec<StateChange>) {
        self.stats.record_call_ended();
        self.interventions.close(&p.call_id);

        match self.calls.end(&p.call_id) {
            Some(call) => {
                tracing::info!(call_id = %p.call_id, "Call ended");
                changes.push(StateChange::CallUpdated(CallUpdatedMessage {
                    phase: CallPhase::Ended,
                    call,
                }));
            }
            None => tracing::debug!(call_id = %p.call_id, "End for unknown call"),
        }
    }

    fn on_transcript_update(
        &mut self,
        p: &CallTranscriptUpdatePayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        self.stats.record_transcript_update();
        let outcome = self
            .calls
            .update_transcript(&p.call_id, &p.transcript, p.ai_confidence);
        if outcome == TranscriptOutcome::UnknownCall {
            return;
        }

        let Some(call) = self.calls.get(&p.call_id).cloned() else {
            return;
        };
        let situation = call
            .incident_type
            .clone()
            .unwrap_or_else(|| "voice_call".to_string());
        changes.push(StateChange::CallUpdated(CallUpdatedMessage {
            phase: CallPhase::Transcript,
            call,
        }));

        if outcome == TranscriptOutcome::Escalate {
            tracing::warn!(call_id = %p.call_id, "Escalating call after repeated low confidence");
            let request = InterventionRequest::raised(
                &p.call_id,
                LOW_CONFIDENCE_REASON,
                p.ai_confidence,
                situation,
                ThreatLevel::High,
                now,
            );
            self.request_intervention(request, true, now, changes);
        }
    }

    fn on_intervention_resolved(
        &mut self,
        p: &InterventionResolvedPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        match self.interventions.resolve(&p.request_id) {
            Some((subject_id, t)) => self.note_transition(&subject_id, t, now, changes),
            None => tracing::debug!(request_id = %p.request_id, "Resolution for unknown request"),
        }
    }

    fn on_threat_alert(
        &mut self,
        envelope: &EventEnvelope,
        p: &ThreatAlertPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let camera_id = envelope.resolve_camera(p.camera_id.as_deref());
        let zone_id = envelope.resolve_zone(p.zone_id.as_deref());
        self.logs
            .threat_alerts
            .insert(LoggedEvent::new(envelope, camera_id, zone_id, p), now);

        let alert_id = zone_id.map(|zone| {
            self.upsert_zone(
                zone,
                ZoneAlert {
                    zone_id: zone.to_string(),
                    alert_id: ZoneAlert::make_alert_id(zone, now),
                    threat_level: p.threat_level,
                    threat_type: p.alert_type.clone(),
                    description: p.description.clone(),
                    confidence: p.confidence,
                    camera_id: camera_id.map(str::to_string),
                    created_at: now,
                },
                now,
                changes,
            )
        });
        self.stats.record_threat_alert(p.threat_level, self.zones.len());

        self.push_alert(
            alert_id,
            EventKind::ThreatAlert,
            p.threat_level,
            describe(&p.alert_type, &p.description),
            camera_id,
            zone_id,
            now,
            changes,
        );
        self.consider_focus(camera_id, zone_id, p.threat_level, now, changes);
    }

    fn on_engine_status(
        &mut self,
        p: &EngineStatusPayload,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        self.stats.record_engine_status();
        if self.engines.apply(p, now) {
            tracing::info!(
                connected = p.connected,
                offline = ?self.engines.offline_engines(),
                "Engine status changed"
            );
            changes.push(StateChange::EngineStatus(self.engines.clone()));
        }
    }

    // ========================================
    // Shared steps
    // ========================================

    #[allow(clippy::too_many_arguments)]
    fn push_alert(
        &mut self,
        alert_id: Option<String>,
        source: EventKind,
        severity: ThreatLevel,
        message: String,
        camera_id: Option<&str>,
        zone_id: Option<&str>,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let alert = ConsoleAlert {
            alert_id: alert_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            source,
            severity,
            message,
            camera_id: camera_id.map(str::to_string),
            zone_id: zone_id.map(str::to_string),
            created_at: now,
        };
        self.logs.alerts.insert(alert.clone(), now);
        self.stats.record_alert(severity);
        changes.push(StateChange::AlertRaised(alert));
    }

    /// Upsert the zone's alert and record it in the history. Returns the alert id.
    fn upsert_zone(
        &mut self,
        zone_id: &str,
        alert: ZoneAlert,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) -> String {
        let alert_id = alert.alert_id.clone();
        self.zones.upsert(zone_id, alert.clone());
        self.logs.alert_history.insert(alert.clone(), now);
        changes.push(StateChange::ZoneAlertUpserted(alert));
        alert_id
    }

    fn consider_focus(
        &mut self,
        camera_id: Option<&str>,
        zone_id: Option<&str>,
        severity: ThreatLevel,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let Some(camera_id) = camera_id else {
            return;
        };
        if self.focus.consider(camera_id, zone_id, severity, now) {
            self.stats.record_focus_switch();
            changes.push(StateChange::FocusChanged(self.focus.current_focus()));
        }
    }

    fn request_intervention(
        &mut self,
        request: InterventionRequest,
        auto_raised: bool,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        let subject_id = request.subject_id.clone();
        let t = self.interventions.request(request, now);
        if t.is_change() {
            self.stats.record_intervention_requested(auto_raised);
        }
        self.note_transition(&subject_id, t, now, changes);
    }

    fn note_transition(
        &mut self,
        subject_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
        changes: &mut Vec<StateChange>,
    ) {
        match &transition {
            Transition::Ignored => {
                tracing::debug!(subject_id = %subject_id, "Intervention operation ignored");
                return;
            }
            Transition::CountdownStarted { .. } => {}
            Transition::Vetoed { .. } => self.stats.record_veto(),
            Transition::Resolved { .. } => self.stats.record_intervention_resolved(),
            Transition::TookOver { origin, .. } => self.stats.record_takeover(*origin),
            Transition::ReturnedToStandby { .. } => self.stats.record_return_to_standby(),
        }
        tracing::debug!(subject_id = %subject_id, transition = ?transition, "Intervention state changed");

        if let Some(view) = self.interventions.view(subject_id, now) {
            changes.push(StateChange::InterventionChanged(view));
        }

        // A subject without a live call ends its interaction once it is back in Standby
        let settled = matches!(
            transition,
            Transition::Vetoed { .. } | Transition::Resolved { .. } | Transition::ReturnedToStandby { .. }
        );
        if settled && self.calls.get(subject_id).is_none() {
            self.interventions.close(subject_id);
            tracing::debug!(subject_id = %subject_id, "Intervention coordinator closed");
        }
    }

    /// Clear views and counters. Live calls, interventions and connectivity are kept.
    fn reset_session(&mut self, now: DateTime<Utc>) {
        self.logs.clear();
        self.zones.clear();
        self.stats.reset(now);
        self.focus.clear();
        tracing::info!("Session reset");
    }
}

fn describe(kind: &str, description: &str) -> String {
    if description.trim().is_empty() {
        kind.to_string()
    } else {
        format!("{}: {}", kind, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::focus_correlator::FocusMode;
    use crate::intervention::TakeoverOrigin;
    use chrono::Duration;

    fn start() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn router_with(config: CoordinatorConfig) -> (ConsoleRouter, ManualClock) {
        let clock = ManualClock::new(start());
        let router = ConsoleRouter::new(&config, Arc::new(clock.clone()));
        (router, clock)
    }

    fn router() -> (ConsoleRouter, ManualClock) {
        router_with(CoordinatorConfig {
            known_cameras: vec!["cam-1".to_string(), "cam-2".to_string()],
            ..Default::default()
        })
    }

    fn event(payload: EventPayload) -> EventEnvelope {
        EventEnvelope::new("test", payload).occurred_at_time(start())
    }

    fn visual(zone: &str, camera: &str, level: ThreatLevel) -> EventEnvelope {
        event(EventPayload::VisualAlert(VisualAlertPayload {
            zone_id: Some(zone.to_string()),
            threat_level: level,
            threat_type: "weapon".to_string(),
            description: "Knife".to_string(),
            confidence: 0.9,
            camera_id: Some(camera.to_string()),
        }))
    }

    fn transcript(call: &str, confidence: f64) -> EventEnvelope {
        event(EventPayload::CallTranscriptUpdate(CallTranscriptUpdatePayload {
            call_id: call.to_string(),
            transcript: "...".to_string(),
            ai_confidence: confidence,
        }))
    }

    fn call_started(call: &str) -> EventEnvelope {
        event(EventPayload::CallStarted(CallStartedPayload {
            call_id: call.to_string(),
            caller_number: "+15550100".to_string(),
            incident_type: Some("break_in".to_string()),
        }))
    }

    fn intervention_request(id: &str, subject: &str) -> EventEnvelope {
        event(EventPayload::InterventionRequested(InterventionRequestedPayload {
            request_id: id.to_string(),
            subject_id: subject.to_string(),
            reason: "uncertain".to_string(),
            ai_confidence: 0.4,
            situation_type: "intrusion".to_string(),
            priority: ThreatLevel::High,
        }))
    }

    #[test]
    fn test_visual_alert_fans_out() {
        let (mut router, _) = router();
        let changes = router.dispatch(&visual("lobby", "cam-1", ThreatLevel::High));

        let snapshot = router.snapshot();
        assert_eq!(snapshot.zone_alerts.len(), 1);
        assert_eq!(snapshot.alert_history.len(), 1);
        assert_eq!(snapshot.alerts.len(), 1);
        assert_eq!(snapshot.alerts[0].alert_id, snapshot.zone_alerts[0].alert_id);
        assert_eq!(snapshot.alerts[0].message, "weapon: Knife");
        assert_eq!(snapshot.focus.camera_id.as_deref(), Some("cam-1"));
        assert_eq!(snapshot.stats.visual_alerts_by_level.high, 1);
        assert_eq!(snapshot.stats.focus_switches, 1);

        let types: Vec<&str> = changes.iter().map(|c| c.type_name()).collect();
        assert_eq!(types, vec!["zone_alert_upserted", "alert_raised", "focus_changed"]);
    }

    #[test]
    fn test_zone_keeps_one_alert() {
        let (mut router, clock) = router();
        router.dispatch(&visual("lobby", "cam-1", ThreatLevel::Low));
        clock.advance(Duration::seconds(1));
        router.dispatch(&visual("lobby", "cam-1", ThreatLevel::Critical));

        let snapshot = router.snapshot();
        assert_eq!(snapshot.zone_alerts.len(), 1);
        assert_eq!(snapshot.zone_alerts[0].threat_level, ThreatLevel::Critical);
        assert_eq!(snapshot.alert_history.len(), 2);
        assert_eq!(snapshot.stats.peak_active_zone_alerts, 1);
    }

    #[test]
    fn test_visual_alert_without_zone_skips_table() {
        let (mut router, _) = router();
        router.dispatch(&event(EventPayload::VisualAlert(VisualAlertPayload {
            zone_id: None,
            threat_level: ThreatLevel::Medium,
            threat_type: "loitering".to_string(),
            description: String::new(),
            confidence: 0.6,
            camera_id: None,
        })));

        let snapshot = router.snapshot();
        assert!(snapshot.zone_alerts.is_empty());
        assert_eq!(snapshot.alerts.len(), 1);
        assert_eq!(snapshot.alerts[0].message, "loitering");
        assert_eq!(snapshot.focus.camera_id, None);
    }

    #[test]
    fn test_threat_alert_upserts_zone() {
        let (mut router, _) = router();
        router.dispatch(&event(EventPayload::ThreatAlert(ThreatAlertPayload {
            alert_type: "fight".to_string(),
            threat_level: ThreatLevel::Critical,
            zone_id: Some("parking".to_string()),
            camera_id: Some("cam-2".to_string()),
            description: "Two people".to_string(),
            confidence: 0.8,
            engines_triggered: vec!["pose".to_string()],
        })));

        let snapshot = router.snapshot();
        assert_eq!(snapshot.threat_alerts.len(), 1);
        assert_eq!(snapshot.zone_alerts[0].threat_type, "fight");
        assert_eq!(snapshot.alerts[0].source, EventKind::ThreatAlert);
        assert_eq!(snapshot.focus.severity, Some(ThreatLevel::Critical));
    }

    #[test]
    fn test_person_recognized_updates_by_face_id() {
        let (mut router, clock) = router();
        let recognized = |name: &str| {
            event(EventPayload::PersonRecognized(PersonRecognizedPayload {
                face_id: "face-1".to_string(),
                person_name: name.to_string(),
                person_type: PersonType::Staff,
                camera_id: None,
            }))
        };
        router.dispatch(&recognized("Ana"));
        clock.advance(Duration::seconds(5));
        router.dispatch(&event(EventPayload::PersonRecognized(PersonRecognizedPayload {
            face_id: "face-2".to_string(),
            person_name: "Bo".to_string(),
            person_type: PersonType::Unknown,
            camera_id: None,
        })));
        router.dispatch(&recognized("Ana M."));

        let snapshot = router.snapshot();
        assert_eq!(snapshot.recognized_persons.len(), 2);
        assert_eq!(snapshot.recognized_persons[0].person_name, "Ana M.");
        assert_eq!(snapshot.recognized_persons[0].recognized_at, start() + Duration::seconds(5));
        assert_eq!(snapshot.stats.persons_recognized, 3);
    }

    #[test]
    fn test_camera_status_registers_and_alerts_on_loss() {
        let (mut router, _) = router();
        let status = |online: &str| {
            event(EventPayload::CameraStatus(CameraStatusPayload {
                camera_id: "cam-9".to_string(),
                status: online.to_string(),
            }))
        };

        assert_eq!(router.dispatch(&status("online")).len(), 1);
        assert!(router.dispatch(&status("online")).is_empty());
        let changes = router.dispatch(&status("offline"));
        assert_eq!(changes.len(), 2);

        let snapshot = router.snapshot();
        assert_eq!(snapshot.stats.cameras_lost, 1);
        assert_eq!(snapshot.alerts[0].severity, ThreatLevel::Medium);
        // Registered camera can now take focus
        router.dispatch(&visual("gate", "cam-9", ThreatLevel::High));
        assert_eq!(router.snapshot().focus.camera_id.as_deref(), Some("cam-9"));
    }

    #[test]
    fn test_unknown_camera_does_not_take_focus() {
        let (mut router, _) = router();
        router.dispatch(&visual("lobby", "cam-77", ThreatLevel::Critical));
        let snapshot = router.snapshot();
        assert_eq!(snapshot.focus.camera_id, None);
        assert_eq!(snapshot.zone_alerts.len(), 1);
    }

    #[test]
    fn test_request_then_expire_escalates() {
        let (mut router, clock) = router();
        router.dispatch(&intervention_request("r1", "call-1"));
        assert_eq!(router.next_deadline(), Some(start() + Duration::seconds(15)));

        clock.advance(Duration::seconds(10));
        assert!(router.expire_due().is_empty());
        match &router.countdown_ticks()[0] {
            StateChange::CountdownTick(tick) => {
                assert_eq!(tick.seconds_remaining, 5);
                assert_eq!(tick.total_sec, 15);
            }
            other => panic!("unexpected change {:?}", other),
        }

        clock.advance(Duration::seconds(6));
        assert_eq!(router.expire_due().len(), 1);

        let snapshot = router.snapshot();
        let view = snapshot.intervention("call-1").unwrap();
        assert_eq!(view.mode, InterventionMode::Active);
        assert_eq!(view.takeover, Some(TakeoverOrigin::Auto));
        assert_eq!(view.request.as_ref().unwrap().request_id, "r1");
        assert_eq!(snapshot.stats.auto_takeovers, 1);
        assert!(router.countdown_ticks().is_empty());
    }

    #[test]
    fn test_veto_then_stale_expiry_is_noop() {
        let (mut router, clock) = router();
        router.dispatch(&intervention_request("r1", "call-1"));
        router.apply(OperatorCommand::Veto {
            subject_id: "call-1".to_string(),
        });
        assert!(router
            .apply(OperatorCommand::Veto {
                subject_id: "call-1".to_string(),
            })
            .is_empty());

        clock.advance(Duration::seconds(20));
        assert!(router.expire_due().is_empty());
        let snapshot = router.snapshot();
        assert!(snapshot.intervention("call-1").is_none());
        assert_eq!(snapshot.stats.vetoes, 1);
    }

    #[test]
    fn test_resolved_request_returns_to_standby() {
        let (mut router, _) = router();
        router.dispatch(&call_started("call-1"));
        router.dispatch(&intervention_request("r1", "call-1"));
        let changes = router.dispatch(&event(EventPayload::InterventionResolved(
            InterventionResolvedPayload {
                request_id: "r1".to_string(),
            },
        )));
        assert!(changes
            .iter()
            .any(|c| matches!(c, StateChange::InterventionChanged(v) if v.mode == InterventionMode::Standby)));

        // The live call keeps its coordinator for further requests
        let snapshot = router.snapshot();
        assert_eq!(snapshot.intervention("call-1").unwrap().mode, InterventionMode::Standby);
        assert_eq!(snapshot.stats.interventions_resolved, 1);
    }

    #[test]
    fn test_low_confidence_transcripts_raise_intervention() {
        let (mut router, _) = router();
        router.dispatch(&call_started("call-1"));
        router.dispatch(&transcript("call-1", 0.3));
        router.dispatch(&transcript("call-1", 0.3));
        let changes = router.dispatch(&transcript("call-1", 0.3));
        assert!(changes
            .iter()
            .any(|c| matches!(c, StateChange::InterventionChanged(v) if v.mode == InterventionMode::Countdown)));

        let snapshot = router.snapshot();
        let request = snapshot.intervention("call-1").unwrap().request.clone().unwrap();
        assert_eq!(request.reason, LOW_CONFIDENCE_REASON);
        assert_eq!(request.situation_type, "break_in");
        assert_eq!(snapshot.stats.interventions_auto_raised, 1);
        assert!(snapshot.calls[0].escalated);
    }

    #[test]
    fn test_call_end_cancels_countdown() {
        let (mut router, clock) = router();
        router.dispatch(&call_started("call-1"));
        router.dispatch(&intervention_request("r1", "call-1"));
        router.dispatch(&event(EventPayload::CallEnded(CallEndedPayload {
            call_id: "call-1".to_string(),
        })));

        assert!(router.next_deadline().is_none());
        clock.advance(Duration::seconds(30));
        assert!(router.expire_due().is_empty());
        let snapshot = router.snapshot();
        assert!(snapshot.calls.is_empty());
        assert!(snapshot.intervention("call-1").is_none());
    }

    #[test]
    fn test_operator_takeover_and_return() {
        let (mut router, _) = router();
        router.apply(OperatorCommand::RequestIntervention {
            subject_id: "threat-1".to_string(),
            reason: "suspicious".to_string(),
            situation_type: "loitering".to_string(),
            priority: ThreatLevel::Medium,
        });
        router.apply(OperatorCommand::Takeover {
            subject_id: "threat-1".to_string(),
        });
        router.apply(OperatorCommand::ReturnToStandby {
            subject_id: "threat-1".to_string(),
        });

        let stats = router.snapshot().stats;
        assert_eq!(stats.interventions_requested, 1);
        assert_eq!(stats.manual_takeovers, 1);
        assert_eq!(stats.returns_to_standby, 1);
    }

    #[test]
    fn test_threat_interactions_close_when_settled() {
        let (mut router, _) = router();
        for (i, subject) in ["threat-1", "threat-2", "threat-3"].iter().enumerate() {
            router.dispatch(&intervention_request(&format!("r{}", i), subject));
        }
        assert_eq!(router.snapshot().interventions.len(), 3);

        let changes = router.apply(OperatorCommand::Veto {
            subject_id: "threat-1".to_string(),
        });
        assert!(changes
            .iter()
            .any(|c| matches!(c, StateChange::InterventionChanged(v) if v.mode == InterventionMode::Standby)));

        router.dispatch(&event(EventPayload::InterventionResolved(
            InterventionResolvedPayload {
                request_id: "r1".to_string(),
            },
        )));
        router.apply(OperatorCommand::Takeover {
            subject_id: "threat-3".to_string(),
        });
        router.apply(OperatorCommand::ReturnToStandby {
            subject_id: "threat-3".to_string(),
        });

        let snapshot = router.snapshot();
        assert!(snapshot.interventions.is_empty());
        assert!(router.next_deadline().is_none());

        // A later request for the same subject opens a fresh coordinator
        router.dispatch(&intervention_request("r9", "threat-1"));
        assert_eq!(
            router.snapshot().intervention("threat-1").unwrap().mode,
            InterventionMode::Countdown
        );
    }

    #[test]
    fn test_pin_and_clear_zones() {
        let (mut router, _) = router();
        router.apply(OperatorCommand::PinFocus {
            camera_id: "cam-2".to_string(),
        });
        router.dispatch(&visual("lobby", "cam-1", ThreatLevel::Critical));
        router.dispatch(&visual("dock", "cam-1", ThreatLevel::High));
        assert_eq!(router.snapshot().focus.mode, FocusMode::Pinned);
        assert_eq!(router.snapshot().focus.camera_id.as_deref(), Some("cam-2"));

        let cleared = router.apply(OperatorCommand::ClearZone {
            zone_id: "lobby".to_string(),
        });
        assert_eq!(cleared.len(), 1);
        assert!(router
            .apply(OperatorCommand::ClearZone {
                zone_id: "lobby".to_string(),
            })
            .is_empty());
        assert_eq!(router.apply(OperatorCommand::ClearAllZones).len(), 1);
        assert!(router.snapshot().zone_alerts.is_empty());
    }

    #[test]
    fn test_reset_session_keeps_live_state() {
        let (mut router, _) = router();
        router.dispatch(&call_started("call-1"));
        router.dispatch(&visual("lobby", "cam-1", ThreatLevel::High));
        router.record_unrecognized("weather_report");
        router.apply(OperatorCommand::ResetSession);

        let snapshot = router.snapshot();
        assert!(snapshot.alerts.is_empty());
        assert!(snapshot.zone_alerts.is_empty());
        assert_eq!(snapshot.stats.events_total, 0);
        assert_eq!(snapshot.stats.unrecognized_events, 0);
        assert_eq!(snapshot.focus.camera_id, None);
        assert_eq!(snapshot.calls.len(), 1);
    }

    #[test]
    fn test_detection_log_is_bounded() {
        let (mut router, _) = router();
        for i in 0..101 {
            router.dispatch(&event(EventPayload::Detection(DetectionPayload {
                camera_id: Some("cam-1".to_string()),
                object_type: format!("obj-{}", i),
                confidence: 0.5,
                bounding_box: None,
                is_known_person: None,
                threat_level: None,
            })));
        }
        let snapshot = router.snapshot();
        assert_eq!(snapshot.detections.len(), 100);
        assert_eq!(snapshot.detections[0].payload.object_type, "obj-100");
        assert_eq!(snapshot.stats.detections_total, 101);
    }

    #[test]
    fn test_engine_status_change_only() {
        let (mut router, _) = router();
        let report = |up: bool| {
            let mut engines = std::collections::BTreeMap::new();
            engines.insert("face".to_string(), up);
            event(EventPayload::EngineStatus(EngineStatusPayload {
                connected: true,
                engines,
            }))
        };
        assert_eq!(router.dispatch(&report(true)).len(), 1);
        assert!(router.dispatch(&report(true)).is_empty());
        assert_eq!(router.dispatch(&report(false)).len(), 1);

        let snapshot = router.snapshot();
        assert_eq!(snapshot.engine_status.offline_engines(), vec!["face"]);
        assert_eq!(snapshot.stats.engine_status_reports, 3);
    }
}
