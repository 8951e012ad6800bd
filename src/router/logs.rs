//! Operator view logs

use super::types::{
    ConsoleAlert, DetectionRecord, FaceAlertRecord, FaceDetectionRecord, RecognizedPerson,
    ThreatAlertRecord,
};
use crate::bounded_log::BoundedLog;
use crate::config::LogCapacities;
use crate::zone_alerts::ZoneAlert;

/// One bounded log per view
#[derive(Debug, Clone)]
pub struct ConsoleLogs {
    pub detections: BoundedLog<DetectionRecord>,
    pub alerts: BoundedLog<ConsoleAlert>,
    pub face_detections: BoundedLog<FaceDetectionRecord>,
    pub face_alerts: BoundedLog<FaceAlertRecord>,
    pub threat_alerts: BoundedLog<ThreatAlertRecord>,
    pub recognized_persons: BoundedLog<RecognizedPerson>,
    pub alert_history: BoundedLog<ZoneAlert>,
}

impl ConsoleLogs {
    pub fn new(capacities: &LogCapacities) -> Self {
        Self {
            detections: BoundedLog::new(capacities.detections),
            alerts: BoundedLog::new(capacities.alerts),
            face_detections: BoundedLog::new(capacities.face_detections),
            face_alerts: BoundedLog::new(capacities.face_alerts),
            threat_alerts: BoundedLog::new(capacities.threat_alerts),
            recognized_persons: BoundedLog::new(capacities.recognized_persons),
            alert_history: BoundedLog::new(capacities.alert_history),
        }
    }

    pub fn clear(&mut self) {
        self.detections.clear();
        self.alerts.clear();
        self.face_detections.clear();
        self.face_alerts.clear();
        self.threat_alerts.clear();
        self.recognized_persons.clear();
        self.alert_history.clear();
    }
}
