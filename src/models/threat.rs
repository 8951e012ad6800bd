//! Severity and person classification shared by all event kinds

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Threat / alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ThreatLevelRepr", into = "String")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 4] = [
        ThreatLevel::Low,
        ThreatLevel::Medium,
        ThreatLevel::High,
        ThreatLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }

    /// Numeric level as emitted by the detection engines (1-4)
    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            1 => Ok(ThreatLevel::Low),
            2 => Ok(ThreatLevel::Medium),
            3 => Ok(ThreatLevel::High),
            4 => Ok(ThreatLevel::Critical),
            other => Err(Error::Parse(format!("threat level out of range: {}", other))),
        }
    }
}

impl Default for ThreatLevel {
    fn default() -> Self {
        ThreatLevel::Medium
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "info" | "safe" => Ok(ThreatLevel::Low),
            "medium" | "moderate" | "warning" => Ok(ThreatLevel::Medium),
            "high" => Ok(ThreatLevel::High),
            "critical" | "emergency" | "weapon" => Ok(ThreatLevel::Critical),
            other => Err(Error::Parse(format!("unknown threat level: {}", other))),
        }
    }
}

impl From<ThreatLevel> for String {
    fn from(level: ThreatLevel) -> Self {
        level.as_str().to_string()
    }
}

/// Wire representation: engines send either a name or a 1-4 level
#[derive(Deserialize)]
#[serde(untagged)]
enum ThreatLevelRepr {
    Level(u8),
    Name(String),
}

impl TryFrom<ThreatLevelRepr> for ThreatLevel {
    type Error = Error;

    fn try_from(repr: ThreatLevelRepr) -> Result<Self> {
        match repr {
            ThreatLevelRepr::Level(level) => ThreatLevel::from_level(level),
            ThreatLevelRepr::Name(name) => name.parse(),
        }
    }
}

/// Optional level where an unrecognized label ("unknown") decodes as absent
pub(crate) fn deserialize_lenient<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<ThreatLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<ThreatLevelRepr>::deserialize(deserializer)?;
    Ok(repr.and_then(|r| match ThreatLevel::try_from(r) {
        Ok(level) => Some(level),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unrecognized threat level");
            None
        }
    }))
}

/// Face-recognition person category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Resident,
    Staff,
    Visitor,
    Contractor,
    Vip,
    Blacklist,
    #[serde(other)]
    Unknown,
}

impl PersonType {
    /// Any enrolled person counts as known
    pub fn is_known(&self) -> bool {
        !matches!(self, PersonType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Resident => "resident",
            PersonType::Staff => "staff",
            PersonType::Visitor => "visitor",
            PersonType::Contractor => "contractor",
            PersonType::Vip => "vip",
            PersonType::Blacklist => "blacklist",
            PersonType::Unknown => "unknown",
        }
    }
}

impl Default for PersonType {
    fn default() -> Self {
        PersonType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
        assert_eq!(
            ThreatLevel::ALL.iter().max(),
            Some(&ThreatLevel::Critical)
        );
    }

    #[test]
    fn test_threat_level_parse_names_and_levels() {
        assert_eq!("HIGH".parse::<ThreatLevel>().unwrap(), ThreatLevel::High);
        assert_eq!("emergency".parse::<ThreatLevel>().unwrap(), ThreatLevel::Critical);
        assert!("purple".parse::<ThreatLevel>().is_err());

        let from_num: ThreatLevel = serde_json::from_str("4").unwrap();
        assert_eq!(from_num, ThreatLevel::Critical);
        let from_name: ThreatLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(from_name, ThreatLevel::Medium);
        assert!(serde_json::from_str::<ThreatLevel>("9").is_err());
    }

    #[test]
    fn test_engine_labels_map_onto_levels() {
        assert_eq!("WEAPON".parse::<ThreatLevel>().unwrap(), ThreatLevel::Critical);
        assert_eq!("safe".parse::<ThreatLevel>().unwrap(), ThreatLevel::Low);
        assert!("unknown".parse::<ThreatLevel>().is_err());
    }

    #[test]
    fn test_lenient_level_drops_unrecognized_labels() {
        #[derive(Deserialize)]
        struct Reading {
            #[serde(default, deserialize_with = "deserialize_lenient")]
            level: Option<ThreatLevel>,
        }

        let parsed: Reading = serde_json::from_str(r#"{"level": "unknown"}"#).unwrap();
        assert_eq!(parsed.level, None);
        let parsed: Reading = serde_json::from_str(r#"{"level": null}"#).unwrap();
        assert_eq!(parsed.level, None);
        let parsed: Reading = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(parsed.level, None);
        let parsed: Reading = serde_json::from_str(r#"{"level": "weapon"}"#).unwrap();
        assert_eq!(parsed.level, Some(ThreatLevel::Critical));
    }

    #[test]
    fn test_threat_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ThreatLevel::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_person_type_unknown_fallback() {
        let p: PersonType = serde_json::from_str("\"janitor\"").unwrap();
        assert_eq!(p, PersonType::Unknown);
        assert!(!p.is_known());

        let vip: PersonType = serde_json::from_str("\"vip\"").unwrap();
        assert!(vip.is_known());
    }
}
