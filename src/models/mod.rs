//! Shared data models
//!
//! Event taxonomy and severity vocabulary used by every component.

pub mod events;
pub mod threat;

pub use events::*;
pub use threat::{PersonType, ThreatLevel};
