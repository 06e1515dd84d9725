use super::types::ShutdownReason;
use crate::error::EventBusError;
use crate::events::{EventBus, EventFilter};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cloneable trigger that stops a running session and records why
#[derive(Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<ShutdownReason>>>,
}

impl ShutdownHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Request shutdown. The first reason wins.
    pub fn request(&self, reason: ShutdownReason) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                info!("Shutdown requested: {}", reason);
                *slot = Some(reason);
            }
        }
        self.token.cancel();
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().clone()
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Spawn SIGINT and SIGTERM listeners that trigger `handle`
pub fn install_signal_handlers(handle: ShutdownHandle) {
    // SIGTERM, Unix only
    #[cfg(unix)]
    {
        let handle_sigterm = handle.clone();
        tokio::spawn(async move {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            info!("Received SIGTERM signal");
                            handle_sigterm.request(ShutdownReason::Signal("SIGTERM".to_string()));
                        }
                        _ = handle_sigterm.token().cancelled() => {}
                    }
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    // SIGINT (Ctrl+C)
    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => {
                if result.is_ok() {
                    info!("Received SIGINT signal (Ctrl+C)");
                    handle.request(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
            _ = handle.token().cancelled() => {}
        }
    });
}

/// Session lifecycle events, leaving out per-tick subject presence
pub fn lifecycle_events() -> EventFilter {
    EventFilter::EventTypes(vec![
        "rep_completed",
        "mode_changed",
        "session_reset",
        "shutdown_requested",
    ])
}

/// Log bus events passing `filter` until the bus closes or `token` is
/// cancelled; returns how many were logged
pub fn spawn_event_logger(
    event_bus: &EventBus,
    filter: EventFilter,
    token: CancellationToken,
) -> JoinHandle<usize> {
    let mut receiver = event_bus.subscribe_filtered(filter, "event-logger");

    tokio::spawn(async move {
        let mut seen = 0;
        loop {
            tokio::select! {
                result = receiver.recv() => match result {
                    Ok(event) => {
                        seen += 1;
                        debug!("[{}] {}", event.event_type(), event.description());
                    }
                    Err(EventBusError::ChannelClosed) => break,
                    Err(e) => warn!("Event logger: {}", e),
                },
                _ = token.cancelled() => {
                    // Drain what was published before cancellation
                    while let Ok(Some(event)) = receiver.try_recv() {
                        seen += 1;
                        debug!("[{}] {}", event.event_type(), event.description());
                    }
                    break;
                }
            }
        }
        debug!("Event logger stopped after {} events", seen);
        seen
    })
}
