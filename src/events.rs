use crate::analyzer::RepEvent;
use crate::config::ExerciseMode;
use crate::error::EventBusError;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events that can occur during a tracking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoachEvent {
    /// A repetition finished and was graded
    RepCompleted { session_id: Uuid, rep: RepEvent },
    /// The exercise mode changed, starting a new session
    ModeChanged {
        from: ExerciseMode,
        to: ExerciseMode,
        session_id: Uuid,
    },
    /// Statistics were cleared on request
    SessionReset { session_id: Uuid },
    /// A subject appeared after ticks without one
    SubjectAcquired { tick: u64 },
    /// The pose estimator stopped reporting a subject
    SubjectLost { tick: u64 },
    /// The runner is stopping
    ShutdownRequested { reason: String },
}

impl CoachEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CoachEvent::RepCompleted { rep, .. } => format!(
                "Rep {} completed: {:?} ({} depth{})",
                rep.number,
                rep.verdict,
                rep.depth_label,
                if rep.had_valgus { ", knee valgus" } else { "" }
            ),
            CoachEvent::ModeChanged { from, to, .. } => {
                format!("Mode changed from {} to {}", from, to)
            }
            CoachEvent::SessionReset { session_id } => {
                format!("Session reset, new session {}", session_id)
            }
            CoachEvent::SubjectAcquired { tick } => format!("Subject detected at tick {}", tick),
            CoachEvent::SubjectLost { tick } => format!("No person detected at tick {}", tick),
            CoachEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CoachEvent::RepCompleted { .. } => "rep_completed",
            CoachEvent::ModeChanged { .. } => "mode_changed",
            CoachEvent::SessionReset { .. } => "session_reset",
            CoachEvent::SubjectAcquired { .. } => "subject_acquired",
            CoachEvent::SubjectLost { .. } => "subject_lost",
            CoachEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast event bus for session observers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoachEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CoachEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: CoachEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            CoachEvent::RepCompleted { .. } | CoachEvent::ModeChanged { .. } => {
                info!("{}", event.description());
            }
            CoachEvent::SubjectLost { .. } => {
                warn!("{}", event.description());
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &CoachEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<CoachEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<CoachEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<CoachEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<CoachEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
