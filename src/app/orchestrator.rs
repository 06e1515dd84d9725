use super::input::FrameSource;
use super::runtime::ShutdownHandle;
use super::types::{DriverCommand, OutputRecord, ShutdownReason, TickReport};
use crate::analyzer::EngineHandle;
use crate::error::{NeuroStrideError, Result};
use crate::events::{CoachEvent, EventBus};
use crate::frame::PoseFrame;
use crate::session::SessionSummary;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives one engine from a command source and writes a JSON-lines report
pub struct SessionOrchestrator {
    engine: EngineHandle,
    event_bus: EventBus,
    shutdown: ShutdownHandle,
    strict_input: bool,
    subject_present: Option<bool>,
    ticks_written: u64,
    skipped_lines: u64,
}

impl SessionOrchestrator {
    pub fn new(engine: EngineHandle, event_bus: EventBus) -> Self {
        Self {
            engine,
            event_bus,
            shutdown: ShutdownHandle::new(CancellationToken::new()),
            strict_input: false,
            subject_present: None,
            ticks_written: 0,
            skipped_lines: 0,
        }
    }

    /// Treat an undecodable input line as fatal instead of skipping it
    pub fn with_strict_input(mut self, strict: bool) -> Self {
        self.strict_input = strict;
        self
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Handle for stopping `run` from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Tick reports written so far
    pub fn ticks_written(&self) -> u64 {
        self.ticks_written
    }

    /// Input lines skipped so far in lenient mode
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Consume commands until the source ends or shutdown is requested, then
    /// write the session summary
    pub async fn run<S, W>(&mut self, source: &mut S, writer: &mut W) -> Result<SessionSummary>
    where
        S: FrameSource + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        info!(
            "Session {} running in {} mode",
            self.engine.session_id(),
            self.engine.mode()
        );

        let token = self.shutdown.token().clone();
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    break self
                        .shutdown
                        .reason()
                        .unwrap_or_else(|| ShutdownReason::Signal("cancelled".to_string()));
                }
                next = source.next_command() => next,
            };

            let command = match next {
                Ok(Some(command)) => command,
                Ok(None) => break ShutdownReason::InputExhausted,
                Err(e @ NeuroStrideError::Input { .. }) if !self.strict_input => {
                    self.skipped_lines += 1;
                    warn!("Skipping {}", e);
                    continue;
                }
                Err(e) => {
                    error!("Input failed: {}", e);
                    self.emit(CoachEvent::ShutdownRequested {
                        reason: ShutdownReason::Error(e.to_string()).to_string(),
                    })
                    .await;
                    return Err(e);
                }
            };

            if let Some(report) = self.handle_command(command).await {
                write_record(writer, &OutputRecord::Tick(report)).await?;
                self.ticks_written += 1;
            }
        };

        self.emit(CoachEvent::ShutdownRequested {
            reason: reason.to_string(),
        })
        .await;

        let summary = self.engine.summary();
        write_record(writer, &OutputRecord::Summary(summary.clone())).await?;
        writer.flush().await?;

        info!(
            "Session {} finished ({}): {} ticks, {} reps, {} good, {} warnings",
            summary.session_id,
            reason,
            summary.ticks,
            summary.stats.total,
            summary.stats.good,
            summary.stats.warnings
        );
        if self.skipped_lines > 0 {
            warn!("{} input lines were skipped", self.skipped_lines);
        }

        Ok(summary)
    }

    /// Apply one command; tick commands produce a report
    pub async fn handle_command(&mut self, command: DriverCommand) -> Option<TickReport> {
        match command {
            DriverCommand::Frame(frame) => Some(self.tick(Some(&frame)).await),
            DriverCommand::Absent => Some(self.tick(None).await),
            DriverCommand::Mode { mode } => {
                if let Some((from, session_id)) = self.engine.switch_mode(mode) {
                    self.subject_present = None;
                    self.emit(CoachEvent::ModeChanged {
                        from,
                        to: mode,
                        session_id,
                    })
                    .await;
                }
                None
            }
            DriverCommand::Reset => {
                let session_id = self.engine.reset();
                self.subject_present = None;
                self.emit(CoachEvent::SessionReset { session_id }).await;
                None
            }
        }
    }

    async fn tick(&mut self, frame: Option<&PoseFrame>) -> TickReport {
        let outcome = self.engine.process(frame);
        let present = outcome.snapshot.is_some();

        if self.subject_present != Some(present) {
            self.subject_present = Some(present);
            let event = if present {
                CoachEvent::SubjectAcquired { tick: outcome.tick }
            } else {
                CoachEvent::SubjectLost { tick: outcome.tick }
            };
            self.emit(event).await;
        }

        if let Some(rep) = outcome.rep.clone() {
            self.emit(CoachEvent::RepCompleted {
                session_id: outcome.session_id,
                rep,
            })
            .await;
        }

        TickReport::from_outcome(outcome, self.engine.symmetry_warning_below())
    }

    async fn emit(&self, event: CoachEvent) {
        if !self.event_bus.has_subscribers() {
            debug!("No subscribers for {}", event.event_type());
            return;
        }
        if let Err(e) = self.event_bus.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

async fn write_record<W>(writer: &mut W, record: &OutputRecord) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}
