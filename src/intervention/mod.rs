//! Intervention - Autonomous vs human control of active interactions
//!
//! ## Responsibilities
//!
//! - One countdown coordinator per subject (call or detected-threat interaction)
//! - Auto-escalation to the operator when a countdown reaches its deadline
//! - Expose the earliest pending deadline so the dispatch loop can arm its timer
//!
//! ## Design
//!
//! - Deadlines are absolute; nothing here sleeps or spawns timers
//! - Expiry is injected by the dispatch loop via `expire_due`, so every
//!   transition happens on the single writer
//! - Invalid or stale operations are no-ops ([`Transition::Ignored`])

mod coordinator;
mod types;

pub use coordinator::{remaining_seconds, InterventionCoordinator};
pub use types::*;

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Coordinators keyed by subject id
#[derive(Debug, Clone)]
pub struct InterventionBoard {
    coordinators: HashMap<String, InterventionCoordinator>,
    countdown: Duration,
}

impl InterventionBoard {
    pub fn new(countdown: Duration) -> Self {
        Self {
            coordinators: HashMap::new(),
            countdown,
        }
    }

    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    /// Create a Standby coordinator for a new interaction. Returns false if one exists.
    pub fn open(&mut self, subject_id: &str) -> bool {
        if self.coordinators.contains_key(subject_id) {
            return false;
        }
        self.coordinators.insert(
            subject_id.to_string(),
            InterventionCoordinator::new(subject_id, self.countdown),
        );
        tracing::debug!(subject_id = %subject_id, "Intervention coordinator opened");
        true
    }

    /// Destroy the subject's coordinator; a running countdown is dropped with it
    pub fn close(&mut self, subject_id: &str) -> Option<InterventionCoordinator> {
        let removed = self.coordinators.remove(subject_id);
        if let Some(c) = &removed {
            if c.mode() == InterventionMode::Countdown {
                tracing::info!(
                    subject_id = %subject_id,
                    "Interaction ended during countdown, timer cancelled"
                );
            }
        }
        removed
    }

    /// Route a request to its subject, opening a coordinator for subjects that
    /// were never announced (e.g. threat interactions with no call)
    pub fn request(&mut self, request: InterventionRequest, now: DateTime<Utc>) -> Transition {
        let subject_id = request.subject_id.clone();
        self.open(&subject_id);
        match self.coordinators.get_mut(&subject_id) {
            Some(c) => c.request_intervention(request, now),
            None => Transition::Ignored,
        }
    }

    pub fn veto(&mut self, subject_id: &str) -> Transition {
        self.with_subject(subject_id, |c| c.veto())
    }

    pub fn takeover(&mut self, subject_id: &str) -> Transition {
        self.with_subject(subject_id, |c| c.takeover())
    }

    pub fn return_to_standby(&mut self, subject_id: &str) -> Transition {
        self.with_subject(subject_id, |c| c.return_to_standby())
    }

    /// Resolve whichever coordinator is counting down on `request_id`
    pub fn resolve(&mut self, request_id: &str) -> Option<(String, Transition)> {
        self.coordinators.values_mut().find_map(|c| {
            let pending = c.request().map(|r| r.request_id == request_id).unwrap_or(false);
            if pending {
                Some((c.subject_id().to_string(), c.resolve(request_id)))
            } else {
                None
            }
        })
    }

    /// Auto-escalate every countdown whose deadline has passed
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<(String, Transition)> {
        let mut fired = Vec::new();
        for c in self.coordinators.values_mut() {
            let due = match (c.deadline(), c.request()) {
                (Some(deadline), Some(req)) if deadline <= now => Some(req.request_id.clone()),
                _ => None,
            };
            if let Some(request_id) = due {
                let t = c.expire(&request_id, now);
                if t.is_change() {
                    fired.push((c.subject_id().to_string(), t));
                }
            }
        }
        fired.sort_by(|a, b| a.0.cmp(&b.0));
        fired
    }

    /// Earliest pending deadline across all subjects
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.coordinators.values().filter_map(|c| c.deadline()).min()
    }

    pub fn has_countdown(&self) -> bool {
        self.next_deadline().is_some()
    }

    pub fn view(&self, subject_id: &str, now: DateTime<Utc>) -> Option<InterventionView> {
        self.coordinators.get(subject_id).map(|c| c.current_state(now))
    }

    /// Views of all coordinators, ordered by subject id
    pub fn views(&self, now: DateTime<Utc>) -> Vec<InterventionView> {
        let mut views: Vec<InterventionView> = self
            .coordinators
            .values()
            .map(|c| c.current_state(now))
            .collect();
        views.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        views
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    fn with_subject<F>(&mut self, subject_id: &str, f: F) -> Transition
    where
        F: FnOnce(&mut InterventionCoordinator) -> Transition,
    {
        match self.coordinators.get_mut(subject_id) {
            Some(c) => f(c),
            None => {
                tracing::debug!(subject_id = %subject_id, "No coordinator for subject");
                Transition::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreatLevel;

    fn request(id: &str, subject: &str, now: DateTime<Utc>) -> InterventionRequest {
        InterventionRequest {
            request_id: id.to_string(),
            subject_id: subject.to_string(),
            reason: "operator help".to_string(),
            ai_confidence: 0.5,
            situation_type: "intrusion".to_string(),
            priority: ThreatLevel::High,
            requested_at: now,
        }
    }

    #[test]
    fn test_request_opens_unknown_subject() {
        let now = Utc::now();
        let mut board = InterventionBoard::new(Duration::seconds(15));
        let t = board.request(request("r1", "threat-7", now), now);
        assert!(t.is_change());
        assert_eq!(board.len(), 1);
        assert_eq!(
            board.view("threat-7", now).unwrap().mode,
            InterventionMode::Countdown
        );
    }

    #[test]
    fn test_expire_due_fires_once_per_subject() {
        let now = Utc::now();
        let mut board = InterventionBoard::new(Duration::seconds(15));
        board.open("call-a");
        board.open("call-b");
        board.request(request("ra", "call-a", now), now);
        board.request(request("rb", "call-b", now + Duration::seconds(10)), now + Duration::seconds(10));

        assert_eq!(board.next_deadline(), Some(now + Duration::seconds(15)));

        let fired = board.expire_due(now + Duration::seconds(16));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, "call-a");
        assert!(board.expire_due(now + Duration::seconds(16)).is_empty());

        assert_eq!(board.next_deadline(), Some(now + Duration::seconds(25)));
        let fired = board.expire_due(now + Duration::seconds(30));
        assert_eq!(fired.len(), 1);
        assert!(!board.has_countdown());
    }

    #[test]
    fn test_close_cancels_pending_countdown() {
        let now = Utc::now();
        let mut board = InterventionBoard::new(Duration::seconds(15));
        board.open("call-1");
        board.request(request("r1", "call-1", now), now);

        assert!(board.close("call-1").is_some());
        assert!(board.next_deadline().is_none());
        assert!(board.expire_due(now + Duration::seconds(60)).is_empty());
        assert_eq!(board.veto("call-1"), Transition::Ignored);
    }

    #[test]
    fn test_resolve_by_request_id() {
        let now = Utc::now();
        let mut board = InterventionBoard::new(Duration::seconds(15));
        board.request(request("r1", "call-1", now), now);
        board.request(request("r2", "call-2", now), now);

        let (subject, t) = board.resolve("r2").unwrap();
        assert_eq!(subject, "call-2");
        assert!(matches!(t, Transition::Resolved { .. }));
        assert!(board.resolve("r2").is_none());
        assert_eq!(board.view("call-1", now).unwrap().mode, InterventionMode::Countdown);
    }

    #[test]
    fn test_open_is_idempotent() {
        let now = Utc::now();
        let mut board = InterventionBoard::new(Duration::seconds(15));
        assert!(board.open("call-1"));
        board.request(request("r1", "call-1", now), now);
        assert!(!board.open("call-1"));
        // Re-opening must not reset the running countdown
        assert_eq!(board.view("call-1", now).unwrap().mode, InterventionMode::Countdown);
    }
}
