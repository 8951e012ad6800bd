//! ConsoleService - Single ordered dispatch loop
//!
//! ## Responsibilities
//!
//! - Funnel events and operator commands from any task into one queue
//! - Own the [`ConsoleRouter`]; nothing else mutates console state
//! - Drive intervention countdowns (deadline wake-ups and per-second ticks)
//! - Publish an immutable snapshot after every processed command
//! - Fan out state changes through the [`NotificationHub`]
//!
//! ## Usage
//!
//! ```ignore
//! let (handle, task) = ConsoleService::spawn(config, Arc::new(SystemClock));
//! handle.submit_json(&raw)?;
//! let snapshot = handle.snapshot();
//! ```

use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::models::EventEnvelope;
use crate::notification_hub::{NotificationHub, StateChange};
use crate::router::{ConsoleRouter, ConsoleSnapshot, OperatorCommand};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Queue entry
#[derive(Debug)]
pub enum Command {
    Event(Box<EventEnvelope>),
    Operator(OperatorCommand),
    /// Envelope dropped at decode time; counted by the loop
    Unrecognized(String),
    Shutdown,
}

/// Cloneable producer/reader handle
#[derive(Clone)]
pub struct ConsoleHandle {
    tx: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<ConsoleSnapshot>>,
    hub: Arc<NotificationHub>,
}

impl ConsoleHandle {
    pub fn submit(&self, envelope: EventEnvelope) -> Result<()> {
        self.send(Command::Event(Box::new(envelope)))
    }

    /// Decode and enqueue a wire envelope.
    ///
    /// Unknown event types are logged, counted and dropped (`Ok`); malformed
    /// payloads are returned to the caller.
    pub fn submit_json(&self, raw: &str) -> Result<()> {
        match EventEnvelope::from_json(raw) {
            Ok(envelope) => self.submit(envelope),
            Err(Error::UnknownEventKind(kind)) => {
                tracing::warn!(kind = %kind, "Unknown event kind, dropping");
                self.send(Command::Unrecognized(kind))
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "Failed to decode event");
                Err(e)
            }
        }
    }

    pub fn operator(&self, command: OperatorCommand) -> Result<()> {
        self.send(Command::Operator(command))
    }

    pub fn veto(&self, subject_id: &str) -> Result<()> {
        self.operator(OperatorCommand::Veto {
            subject_id: subject_id.to_string(),
        })
    }

    pub fn takeover(&self, subject_id: &str) -> Result<()> {
        self.operator(OperatorCommand::Takeover {
            subject_id: subject_id.to_string(),
        })
    }

    pub fn return_to_standby(&self, subject_id: &str) -> Result<()> {
        self.operator(OperatorCommand::ReturnToStandby {
            subject_id: subject_id.to_string(),
        })
    }

    pub fn pin_focus(&self, camera_id: &str) -> Result<()> {
        self.operator(OperatorCommand::PinFocus {
            camera_id: camera_id.to_string(),
        })
    }

    /// Latest published snapshot (cheap `Arc` clone)
    pub fn snapshot(&self) -> Arc<ConsoleSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is published
    pub fn watch_snapshots(&self) -> watch::Receiver<Arc<ConsoleSnapshot>> {
        self.snapshots.clone()
    }

    /// Register a notification client
    pub async fn subscribe(&self, client_name: &str) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        self.hub.register(client_name).await
    }

    pub fn hub(&self) -> Arc<NotificationHub> {
        self.hub.clone()
    }

    /// Ask the loop to stop after the commands already queued
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::ChannelClosed)
    }
}

/// Dispatch loop state
pub struct ConsoleService {
    router: ConsoleRouter,
    rx: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Arc<ConsoleSnapshot>>,
    hub: Arc<NotificationHub>,
    tick_interval: StdDuration,
}

impl ConsoleService {
    /// Start the loop on the current tokio runtime
    pub fn spawn(config: CoordinatorConfig, clock: Arc<dyn Clock>) -> (ConsoleHandle, JoinHandle<()>) {
        tracing::info!(
            countdown_secs = config.countdown_secs,
            focus_threshold = %config.focus_threshold,
            focus_hold_secs = config.focus_hold_secs,
            ai_confidence_threshold = config.ai_confidence_threshold,
            known_cameras = config.known_cameras.len(),
            "Starting console dispatch loop"
        );

        let router = ConsoleRouter::new(&config, clock);
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(router.snapshot()));
        let hub = Arc::new(NotificationHub::new());

        let service = Self {
            router,
            rx,
            snapshots: snapshot_tx,
            hub: hub.clone(),
            tick_interval: config.tick_interval(),
        };
        let task = tokio::spawn(service.run());

        let handle = ConsoleHandle {
            tx,
            snapshots: snapshot_rx,
            hub,
        };
        (handle, task)
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let counting_down = self.router.next_deadline().is_some();
            let wait = self.until_next_deadline();

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Shutdown) => {
                        tracing::info!("Shutdown requested");
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        tracing::info!("All console handles dropped");
                        break;
                    }
                },
                _ = sleep_for(wait) => {
                    let changes = self.router.expire_due();
                    self.publish(changes).await;
                }
                _ = ticker.tick(), if counting_down => {
                    let mut changes = self.router.expire_due();
                    changes.extend(self.router.countdown_ticks());
                    self.publish(changes).await;
                }
            }
        }

        tracing::info!("Console dispatch loop stopped");
    }

    async fn handle(&mut self, command: Command) {
        let changes = match command {
            Command::Event(envelope) => self.router.dispatch(&envelope),
            Command::Operator(op) => self.router.apply(op),
            Command::Unrecognized(kind) => {
                self.router.record_unrecognized(&kind);
                Vec::new()
            }
            Command::Shutdown => Vec::new(),
        };
        self.publish(changes).await;
    }

    async fn publish(&mut self, changes: Vec<StateChange>) {
        self.hub.broadcast_all(&changes).await;
        self.snapshots.send_replace(Arc::new(self.router.snapshot()));
    }

    /// Real time until the earliest countdown deadline, by the router's clock
    fn until_next_deadline(&self) -> Option<StdDuration> {
        let deadline = self.router.next_deadline()?;
        let millis = (deadline - self.router.now()).num_milliseconds().max(0) as u64;
        Some(StdDuration::from_millis(millis))
    }
}

async fn sleep_for(wait: Option<StdDuration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}
