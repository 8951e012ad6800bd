//! Console Coordinator Library
//!
//! Decision/coordination core of a security-monitoring console
//!
//! ## Architecture
//!
//! 1. Models - Inbound event taxonomy (closed tagged union)
//! 2. BoundedLog - Fixed-capacity newest-first operator views
//! 3. ZoneAlertTable - One live visual alert per zone
//! 4. SessionStats - Running counters
//! 5. FocusCorrelator - "Which camera to look at now" decision
//! 6. Intervention - Countdown arbitration between AI and human control
//! 7. CameraStatusTracker / CallRegistry - Connectivity and call tracking
//! 8. Router - Classifies events and maintains all derived state
//! 9. NotificationHub - Change notification fan-out
//! 10. ConsoleService - Single ordered dispatch loop and snapshot publisher
//!
//! ## Design Principles
//!
//! - Single writer: the dispatch loop owns every piece of state
//! - Readers get immutable snapshots, never references into live state
//! - Invalid or stale operations are no-ops, not errors

pub mod bounded_log;
pub mod call_registry;
pub mod camera_status_tracker;
pub mod clock;
pub mod config;
pub mod console_service;
pub mod error;
pub mod focus_correlator;
pub mod intervention;
pub mod models;
pub mod notification_hub;
pub mod router;
pub mod session_stats;
pub mod telemetry;
pub mod zone_alerts;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CoordinatorConfig, LogCapacities};
pub use console_service::{ConsoleHandle, ConsoleService};
pub use error::{Error, Result};
pub use notification_hub::StateChange;
pub use router::{ConsoleRouter, ConsoleSnapshot, OperatorCommand};
