//! CallRegistry - Active voice calls handled by the dispatch agent
//!
//! ## Responsibilities
//!
//! - Track each live call from `call_started` to `call_ended`
//! - Keep the latest transcript and AI confidence for the operator view
//! - Count low-confidence transcripts and signal escalation once per call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Live call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: String,
    pub caller_number: String,
    pub incident_type: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_transcript: Option<String>,
    pub last_ai_confidence: Option<f64>,
    pub transcript_updates: u64,
    /// Transcripts below the confidence threshold (not reset by good ones)
    pub low_confidence_count: u32,
    /// Escalation already signalled for this call
    pub escalated: bool,
}

/// Escalation policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationPolicy {
    pub confidence_threshold: f64,
    pub low_confidence_limit: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            low_confidence_limit: 3,
        }
    }
}

/// Outcome of a transcript update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// No such call
    UnknownCall,
    Recorded,
    /// Low-confidence limit reached; caller should raise an intervention
    Escalate,
}

#[derive(Debug, Clone, Default)]
pub struct CallRegistry {
    calls: HashMap<String, CallRecord>,
    policy: EscalationPolicy,
}

impl CallRegistry {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self {
            calls: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    /// Register a call. A repeated start for the same id restarts the record.
    pub fn start(
        &mut self,
        call_id: &str,
        caller_number: &str,
        incident_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> CallRecord {
        let record = CallRecord {
            call_id: call_id.to_string(),
            caller_number: caller_number.to_string(),
            incident_type: incident_type.map(str::to_string),
            started_at: now,
            last_transcript: None,
            last_ai_confidence: None,
            transcript_updates: 0,
            low_confidence_count: 0,
            escalated: false,
        };
        if self.calls.insert(call_id.to_string(), record.clone()).is_some() {
            tracing::warn!(call_id = %call_id, "Call started twice, record restarted");
        }
        record
    }

    pub fn end(&mut self, call_id: &str) -> Option<CallRecord> {
        self.calls.remove(call_id)
    }

    pub fn get(&self, call_id: &str) -> Option<&CallRecord> {
        self.calls.get(call_id)
    }

    pub fn update_transcript(
        &mut self,
        call_id: &str,
        transcript: &str,
        ai_confidence: f64,
    ) -> TranscriptOutcome {
        let policy = self.policy;
        let Some(call) = self.calls.get_mut(call_id) else {
            tracing::debug!(call_id = %call_id, "Transcript for unknown call dropped");
            return TranscriptOutcome::UnknownCall;
        };

        call.last_transcript = Some(transcript.to_string());
        call.last_ai_confidence = Some(ai_confidence);
        call.transcript_updates += 1;

        if ai_confidence >= policy.confidence_threshold {
            return TranscriptOutcome::Recorded;
        }

        call.low_confidence_count += 1;
        tracing::warn!(
            call_id = %call_id,
            ai_confidence = ai_confidence,
            low_confidence_count = call.low_confidence_count,
            "Low transcription confidence"
        );

        if !call.escalated && call.low_confidence_count >= policy.low_confidence_limit {
            call.escalated = true;
            return TranscriptOutcome::Escalate;
        }
        TranscriptOutcome::Recorded
    }

    /// Live calls, oldest first
    pub fn snapshot(&self) -> Vec<CallRecord> {
        let mut calls: Vec<CallRecord> = self.calls.values().cloned().collect();
        calls.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.call_id.cmp(&b.call_id))
        });
        calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
