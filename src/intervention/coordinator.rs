//! Per-interaction countdown state machine
//!
//! ```text
//! Standby --request--> Countdown --veto/resolve--> Standby
//!                      Countdown --takeover------> Active (manual)
//!                      Countdown --deadline------> Active (auto)
//! Active --return_to_standby--> Standby
//! ```
//!
//! Every operation is total: a call that does not apply to the current state
//! returns [`Transition::Ignored`] and leaves the state untouched.

use super::types::*;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq)]
enum CoordinatorState {
    Standby,
    Countdown {
        deadline: DateTime<Utc>,
        request: InterventionRequest,
    },
    Active {
        request: InterventionRequest,
        origin: TakeoverOrigin,
    },
}

/// Countdown coordinator for one subject (call / interaction)
#[derive(Debug, Clone)]
pub struct InterventionCoordinator {
    subject_id: String,
    countdown: Duration,
    state: CoordinatorState,
}

impl InterventionCoordinator {
    pub fn new(subject_id: impl Into<String>, countdown: Duration) -> Self {
        Self {
            subject_id: subject_id.into(),
            countdown,
            state: CoordinatorState::Standby,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn mode(&self) -> InterventionMode {
        match self.state {
            CoordinatorState::Standby => InterventionMode::Standby,
            CoordinatorState::Countdown { .. } => InterventionMode::Countdown,
            CoordinatorState::Active { .. } => InterventionMode::Active,
        }
    }

    /// Deadline of the running countdown
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            CoordinatorState::Countdown { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// Request currently held (countdown or active)
    pub fn request(&self) -> Option<&InterventionRequest> {
        match &self.state {
            CoordinatorState::Standby => None,
            CoordinatorState::Countdown { request, .. } => Some(request),
            CoordinatorState::Active { request, .. } => Some(request),
        }
    }

    /// Standby -> Countdown.
    ///
    /// A request while already counting down is ignored so the original deadline
    /// stands; a request while active is ignored because a human already has control.
    pub fn request_intervention(
        &mut self,
        request: InterventionRequest,
        now: DateTime<Utc>,
    ) -> Transition {
        match &self.state {
            CoordinatorState::Standby => {
                let deadline = now + self.countdown;
                let request_id = request.request_id.clone();
                tracing::info!(
                    subject_id = %self.subject_id,
                    request_id = %request_id,
                    reason = %request.reason,
                    deadline = %deadline,
                    "Intervention countdown started"
                );
                self.state = CoordinatorState::Countdown { deadline, request };
                Transition::CountdownStarted {
                    request_id,
                    deadline,
                }
            }
            CoordinatorState::Countdown { request: pending, .. } => {
                tracing::debug!(
                    subject_id = %self.subject_id,
                    pending_request_id = %pending.request_id,
                    ignored_request_id = %request.request_id,
                    "Intervention request ignored, countdown already running"
                );
                Transition::Ignored
            }
            CoordinatorState::Active { .. } => {
                tracing::debug!(
                    subject_id = %self.subject_id,
                    ignored_request_id = %request.request_id,
                    "Intervention request ignored, human already in control"
                );
                Transition::Ignored
            }
        }
    }

    /// Countdown -> Standby; the interaction stays autonomous
    pub fn veto(&mut self) -> Transition {
        match std::mem::replace(&mut self.state, CoordinatorState::Standby) {
            CoordinatorState::Countdown { request, .. } => {
                tracing::info!(
                    subject_id = %self.subject_id,
                    request_id = %request.request_id,
                    "Intervention vetoed"
                );
                Transition::Vetoed {
                    request_id: request.request_id,
                }
            }
            other => {
                self.state = other;
                Transition::Ignored
            }
        }
    }

    /// Countdown -> Active (manual)
    pub fn takeover(&mut self) -> Transition {
        self.escalate(TakeoverOrigin::Manual)
    }

    /// Countdown -> Active (auto) once `now` reaches the deadline.
    ///
    /// Stale firings (other request, already resolved, deadline not reached) are no-ops.
    pub fn expire(&mut self, request_id: &str, now: DateTime<Utc>) -> Transition {
        match &self.state {
            CoordinatorState::Countdown { deadline, request }
                if request.request_id == request_id && now >= *deadline =>
            {
                self.escalate(TakeoverOrigin::Auto)
            }
            _ => Transition::Ignored,
        }
    }

    /// Countdown -> Standby when the pending request was resolved upstream
    pub fn resolve(&mut self, request_id: &str) -> Transition {
        match &self.state {
            CoordinatorState::Countdown { request, .. } if request.request_id == request_id => {
                tracing::info!(
                    subject_id = %self.subject_id,
                    request_id = %request_id,
                    "Intervention resolved before takeover"
                );
                self.state = CoordinatorState::Standby;
                Transition::Resolved {
                    request_id: request_id.to_string(),
                }
            }
            _ => Transition::Ignored,
        }
    }

    /// Active -> Standby, operator hands control back to the AI
    pub fn return_to_standby(&mut self) -> Transition {
        match std::mem::replace(&mut self.state, CoordinatorState::Standby) {
            CoordinatorState::Active { request, .. } => {
                tracing::info!(
                    subject_id = %self.subject_id,
                    request_id = %request.request_id,
                    "Returned to autonomous handling"
                );
                Transition::ReturnedToStandby {
                    request_id: request.request_id,
                }
            }
            other => {
                self.state = other;
                Transition::Ignored
            }
        }
    }

    fn escalate(&mut self, origin: TakeoverOrigin) -> Transition {
        match std::mem::replace(&mut self.state, CoordinatorState::Standby) {
            CoordinatorState::Countdown { request, .. } => {
                let request_id = request.request_id.clone();
                match origin {
                    TakeoverOrigin::Manual => tracing::info!(
                        subject_id = %self.subject_id,
                        request_id = %request_id,
                        "Operator took over"
                    ),
                    TakeoverOrigin::Auto => tracing::warn!(
                        subject_id = %self.subject_id,
                        request_id = %request_id,
                        "Countdown expired, control passed to operator"
                    ),
                }
                self.state = CoordinatorState::Active { request, origin };
                Transition::TookOver { request_id, origin }
            }
            other => {
                self.state = other;
                Transition::Ignored
            }
        }
    }

    /// Point-in-time view; remaining time is derived from the deadline
    pub fn current_state(&self, now: DateTime<Utc>) -> InterventionView {
        let (remaining_seconds, takeover) = match &self.state {
            CoordinatorState::Standby => (None, None),
            CoordinatorState::Countdown { deadline, .. } => {
                (Some(remaining_seconds(*deadline, now)), None)
            }
            CoordinatorState::Active { origin, .. } => (None, Some(*origin)),
        };

        InterventionView {
            subject_id: self.subject_id.clone(),
            mode: self.mode(),
            remaining_seconds,
            deadline: self.deadline(),
            request: self.request().cloned(),
            takeover,
        }
    }
}

/// Whole seconds until `deadline`, rounded up, never negative
pub fn remaining_seconds(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        ((millis + 999) / 1000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreatLevel;

    fn request(id: &str) -> InterventionRequest {
        InterventionRequest {
            request_id: id.to_string(),
            subject_id: "call-1".to_string(),
            reason: "low confidence".to_string(),
            ai_confidence: 0.4,
            situation_type: "medical".to_string(),
            priority: ThreatLevel::High,
            requested_at: Utc::now(),
        }
    }

    fn coordinator() -> InterventionCoordinator {
        InterventionCoordinator::new("call-1", Duration::seconds(15))
    }

    #[test]
    fn test_request_starts_countdown() {
        let now = Utc::now();
        let mut c = coordinator();
        let t = c.request_intervention(request("r1"), now);

        assert_eq!(
            t,
            Transition::CountdownStarted {
                request_id: "r1".into(),
                deadline: now + Duration::seconds(15),
            }
        );
        let view = c.current_state(now);
        assert_eq!(view.mode, InterventionMode::Countdown);
        assert_eq!(view.remaining_seconds, Some(15));
    }

    #[test]
    fn test_auto_takeover_after_deadline_keeps_request() {
        let now = Utc::now();
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);

        let later = now + Duration::seconds(16);
        let t = c.expire("r1", later);
        assert_eq!(
            t,
            Transition::TookOver {
                request_id: "r1".into(),
                origin: TakeoverOrigin::Auto,
            }
        );

        let view = c.current_state(later);
        assert_eq!(view.mode, InterventionMode::Active);
        assert_eq!(view.request.unwrap().request_id, "r1");
        assert_eq!(view.takeover, Some(TakeoverOrigin::Auto));
        assert_eq!(view.remaining_seconds, None);

        // A second firing is stale
        assert_eq!(c.expire("r1", later), Transition::Ignored);
    }

    #[test]
    fn test_expire_before_deadline_is_noop() {
        let now = Utc::now();
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);
        assert_eq!(c.expire("r1", now + Duration::seconds(14)), Transition::Ignored);
        assert_eq!(c.mode(), InterventionMode::Countdown);
    }

    #[test]
    fn test_veto_idempotence() {
        let now = Utc::now();
        let mut c = coordinator();

        // Standby: no effect
        assert_eq!(c.veto(), Transition::Ignored);
        assert_eq!(c.current_state(now), coordinator().current_state(now));

        // Countdown: back to standby, request cleared
        c.request_intervention(request("r1"), now);
        assert!(matches!(c.veto(), Transition::Vetoed { .. }));
        let view = c.current_state(now);
        assert_eq!(view.mode, InterventionMode::Standby);
        assert!(view.request.is_none());

        // Active: no effect
        c.request_intervention(request("r2"), now);
        c.takeover();
        let before = c.current_state(now);
        assert_eq!(c.veto(), Transition::Ignored);
        assert_eq!(c.current_state(now), before);
    }

    #[test]
    fn test_takeover_and_expiry_race_single_transition() {
        let now = Utc::now();
        let deadline = now + Duration::seconds(15);

        // Manual first, then the timer at the same instant
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);
        assert!(c.takeover().is_change());
        assert_eq!(c.expire("r1", deadline), Transition::Ignored);
        assert_eq!(c.current_state(deadline).takeover, Some(TakeoverOrigin::Manual));

        // Timer first, then the manual takeover
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);
        assert!(c.expire("r1", deadline).is_change());
        assert_eq!(c.takeover(), Transition::Ignored);
        assert_eq!(c.current_state(deadline).takeover, Some(TakeoverOrigin::Auto));
    }

    #[test]
    fn test_second_request_during_countdown_ignored() {
        let now = Utc::now();
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);

        let t = c.request_intervention(request("r2"), now + Duration::seconds(10));
        assert_eq!(t, Transition::Ignored);
        assert_eq!(c.request().unwrap().request_id, "r1");
        assert_eq!(c.deadline(), Some(now + Duration::seconds(15)));
    }

    #[test]
    fn test_active_only_exits_via_return_to_standby() {
        let now = Utc::now();
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);
        c.takeover();

        assert_eq!(c.resolve("r1"), Transition::Ignored);
        assert_eq!(c.expire("r1", now + Duration::hours(1)), Transition::Ignored);
        assert_eq!(c.mode(), InterventionMode::Active);

        assert!(matches!(c.return_to_standby(), Transition::ReturnedToStandby { .. }));
        assert_eq!(c.mode(), InterventionMode::Standby);
        assert!(c.request().is_none());
        assert_eq!(c.return_to_standby(), Transition::Ignored);
    }

    #[test]
    fn test_resolve_requires_matching_request() {
        let now = Utc::now();
        let mut c = coordinator();
        c.request_intervention(request("r1"), now);
        assert_eq!(c.resolve("other"), Transition::Ignored);
        assert!(matches!(c.resolve("r1"), Transition::Resolved { .. }));
        assert_eq!(c.mode(), InterventionMode::Standby);
    }

    #[test]
    fn test_takeover_from_standby_ignored() {
        let mut c = coordinator();
        assert_eq!(c.takeover(), Transition::Ignored);
        assert_eq!(c.mode(), InterventionMode::Standby);
    }

    #[test]
    fn test_remaining_seconds_rounds_up() {
        let now = Utc::now();
        assert_eq!(remaining_seconds(now + Duration::milliseconds(14_001), now), 15);
        assert_eq!(remaining_seconds(now + Duration::milliseconds(1), now), 1);
        assert_eq!(remaining_seconds(now, now), 0);
        assert_eq!(remaining_seconds(now - Duration::seconds(3), now), 0);
    }
}
