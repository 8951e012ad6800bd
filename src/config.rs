//! Coordinator configuration
//!
//! Defaults are usable as-is; `from_env` overrides them from the process
//! environment (after loading `.env` if present).

use crate::call_registry::EscalationPolicy;
use crate::error::{Error, Result};
use crate::focus_correlator::FocusPolicy;
use crate::models::ThreatLevel;
use std::str::FromStr;

/// Upper bound for second-valued settings (one day)
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Per-view log capacities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCapacities {
    pub detections: usize,
    pub alerts: usize,
    pub face_detections: usize,
    pub face_alerts: usize,
    pub threat_alerts: usize,
    pub recognized_persons: usize,
    /// Every zone alert raised this session
    pub alert_history: usize,
}

impl Default for LogCapacities {
    fn default() -> Self {
        Self {
            detections: 100,
            alerts: 50,
            face_detections: 50,
            face_alerts: 30,
            threat_alerts: 30,
            recognized_persons: 20,
            alert_history: 1000,
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Seconds an operator has to veto before auto-escalation
    pub countdown_secs: u64,
    /// Minimum severity that may pull operator focus
    pub focus_threshold: ThreatLevel,
    /// Seconds an auto focus holds against equal-severity candidates
    pub focus_hold_secs: u64,
    /// Transcripts below this confidence count as low-confidence
    pub ai_confidence_threshold: f64,
    /// Low-confidence transcripts per call before an intervention is raised
    pub low_confidence_escalation_count: u32,
    /// Cameras eligible for focus before any status report arrives
    pub known_cameras: Vec<String>,
    /// Countdown tick interval (milliseconds)
    pub countdown_tick_ms: u64,
    pub log_capacities: LogCapacities,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 15,
            focus_threshold: ThreatLevel::High,
            focus_hold_secs: 30,
            ai_confidence_threshold: 0.7,
            low_confidence_escalation_count: 3,
            known_cameras: Vec::new(),
            countdown_tick_ms: 1000,
            log_capacities: LogCapacities::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Load `.env` and read overrides from the environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            countdown_secs: parse_or(&lookup, "COUNTDOWN_SECS", defaults.countdown_secs)?,
            focus_threshold: parse_or(&lookup, "FOCUS_THRESHOLD", defaults.focus_threshold)?,
            focus_hold_secs: parse_or(&lookup, "FOCUS_HOLD_SECS", defaults.focus_hold_secs)?,
            ai_confidence_threshold: parse_or(
                &lookup,
                "AI_CONFIDENCE_THRESHOLD",
                defaults.ai_confidence_threshold,
            )?,
            low_confidence_escalation_count: parse_or(
                &lookup,
                "LOW_CONFIDENCE_ESCALATION_COUNT",
                defaults.low_confidence_escalation_count,
            )?,
            known_cameras: lookup("KNOWN_CAMERAS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            countdown_tick_ms: parse_or(&lookup, "COUNTDOWN_TICK_MS", defaults.countdown_tick_ms)?,
            log_capacities: defaults.log_capacities,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ai_confidence_threshold) {
            return Err(Error::Config(format!(
                "AI_CONFIDENCE_THRESHOLD must be within 0..=1, got {}",
                self.ai_confidence_threshold
            )));
        }
        if self.low_confidence_escalation_count == 0 {
            return Err(Error::Config(
                "LOW_CONFIDENCE_ESCALATION_COUNT must be at least 1".to_string(),
            ));
        }
        for (key, secs) in [
            ("COUNTDOWN_SECS", self.countdown_secs),
            ("FOCUS_HOLD_SECS", self.focus_hold_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(Error::Config(format!(
                    "{} must be at most {}, got {}",
                    key, MAX_DURATION_SECS, secs
                )));
            }
        }
        if self.countdown_tick_ms == 0 {
            return Err(Error::Config("COUNTDOWN_TICK_MS must be positive".to_string()));
        }
        Ok(())
    }

    pub fn countdown(&self) -> chrono::Duration {
        bounded_seconds(self.countdown_secs)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn focus_policy(&self) -> FocusPolicy {
        FocusPolicy {
            threshold: self.focus_threshold,
            hold: bounded_seconds(self.focus_hold_secs),
        }
    }

    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            confidence_threshold: self.ai_confidence_threshold,
            low_confidence_limit: self.low_confidence_escalation_count,
        }
    }
}

/// Clamped so a config built without `validate` cannot overflow chrono
fn bounded_seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = CoordinatorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.countdown(), chrono::Duration::seconds(15));
        assert_eq!(config.log_capacities.detections, 100);
    }

    #[test]
    fn test_overrides() {
        let config = CoordinatorConfig::from_lookup(lookup(&[
            ("COUNTDOWN_SECS", "20"),
            ("FOCUS_THRESHOLD", "critical"),
            ("KNOWN_CAMERAS", "cam-1, cam-2,,"),
            ("COUNTDOWN_TICK_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.countdown_secs, 20);
        assert_eq!(config.focus_policy().threshold, ThreatLevel::Critical);
        assert_eq!(config.known_cameras, vec!["cam-1", "cam-2"]);
        assert_eq!(config.tick_interval(), std::time::Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        let err = CoordinatorConfig::from_lookup(lookup(&[("COUNTDOWN_SECS", "soon")])).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("COUNTDOWN_SECS"));
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        for key in ["COUNTDOWN_SECS", "FOCUS_HOLD_SECS"] {
            let result = CoordinatorConfig::from_lookup(lookup(&[(key, "100000000000000000")]));
            match result {
                Err(Error::Config(msg)) => assert!(msg.contains(key)),
                other => panic!("expected config error for {}, got {:?}", key, other),
            }
        }

        let at_limit = CoordinatorConfig::from_lookup(lookup(&[("COUNTDOWN_SECS", "86400")])).unwrap();
        assert_eq!(at_limit.countdown(), chrono::Duration::days(1));
    }

    #[test]
    fn test_unvalidated_durations_do_not_overflow() {
        let config = CoordinatorConfig {
            countdown_secs: u64::MAX,
            focus_hold_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.countdown(), chrono::Duration::seconds(MAX_DURATION_SECS as i64));
        assert_eq!(config.focus_policy().hold, chrono::Duration::seconds(MAX_DURATION_SECS as i64));
    }

    #[test]
    fn test_out_of_range_threshold() {
        let result = CoordinatorConfig::from_lookup(lookup(&[("AI_CONFIDENCE_THRESHOLD", "1.5")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
