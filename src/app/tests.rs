use super::*;
use crate::analyzer::{EngineHandle, MotionEngine};
use crate::config::{ExerciseMode, NeuroStrideConfig};
use crate::error::NeuroStrideError;
use crate::events::{CoachEvent, EventBus, EventFilter};
use crate::frame::{Landmark, LandmarkName, PoseFrame};

use serde_json::Value;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Frame whose knees both bend to `knee_angle`, with no valgus geometry
fn squat_frame(knee_angle: f64) -> PoseFrame {
    let (sin, cos) = knee_angle.to_radians().sin_cos();
    // Thigh points straight up from the knee, so the shin is the thigh rotated
    let left_ankle = (450.0 + 100.0 * sin, 400.0 - 100.0 * cos);
    let right_ankle = (750.0 - 100.0 * sin, 400.0 - 100.0 * cos);

    let points = [
        (LandmarkName::LeftShoulder, (450.0, 100.0)),
        (LandmarkName::RightShoulder, (750.0, 100.0)),
        (LandmarkName::LeftHip, (450.0, 300.0)),
        (LandmarkName::RightHip, (750.0, 300.0)),
        (LandmarkName::LeftKnee, (450.0, 400.0)),
        (LandmarkName::RightKnee, (750.0, 400.0)),
        (LandmarkName::LeftAnkle, left_ankle),
        (LandmarkName::RightAnkle, right_ankle),
    ];
    PoseFrame::new(
        points
            .iter()
            .map(|(name, (x, y))| Landmark::new(*name, *x, *y, 0.9))
            .collect(),
    )
}

fn frame_line(knee_angle: f64) -> String {
    serde_json::to_string(&DriverCommand::Frame(squat_frame(knee_angle))).unwrap()
}

fn orchestrator(event_bus: EventBus) -> SessionOrchestrator {
    let engine = MotionEngine::new(NeuroStrideConfig::default()).unwrap();
    SessionOrchestrator::new(EngineHandle::new(engine), event_bus)
}

fn parse_output(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<CoachEvent>) -> Vec<CoachEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_driver_command_wire_format() {
    let frame: DriverCommand = serde_json::from_str(
        r#"{"type":"frame","landmarks":[{"name":"left_knee","x":1.0,"y":2.0,"confidence":0.9}]}"#,
    )
    .unwrap();
    match &frame {
        DriverCommand::Frame(frame) => {
            let knee = frame.landmark(LandmarkName::LeftKnee).unwrap();
            assert_eq!((knee.x, knee.y), (1.0, 2.0));
        }
        other => panic!("Unexpected command: {:?}", other),
    }
    assert!(frame.is_tick());

    let absent: DriverCommand = serde_json::from_str(r#"{"type":"absent"}"#).unwrap();
    assert_eq!(absent, DriverCommand::Absent);
    assert!(absent.is_tick());

    let mode: DriverCommand = serde_json::from_str(r#"{"type":"mode","mode":"walk"}"#).unwrap();
    assert_eq!(
        mode,
        DriverCommand::Mode {
            mode: ExerciseMode::Walk
        }
    );
    assert!(!mode.is_tick());

    let reset: DriverCommand = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
    assert_eq!(reset, DriverCommand::Reset);
}

#[tokio::test]
async fn test_json_lines_source_skips_blank_lines() {
    let input = format!("\n{}\n\n{{\"type\":\"absent\"}}\n", frame_line(160.0));
    let mut source = JsonLinesSource::new(input.as_bytes());

    assert!(matches!(
        source.next_command().await.unwrap(),
        Some(DriverCommand::Frame(_))
    ));
    assert_eq!(source.line_number(), 2);
    assert_eq!(
        source.next_command().await.unwrap(),
        Some(DriverCommand::Absent)
    );
    assert_eq!(source.line_number(), 4);
    assert_eq!(source.next_command().await.unwrap(), None);
}

#[tokio::test]
async fn test_json_lines_source_reports_bad_line_and_continues() {
    let input = "{\"type\":\"absent\"}\nnot json\n{\"type\":\"reset\"}\n";
    let mut source = JsonLinesSource::new(input.as_bytes());

    assert_eq!(
        source.next_command().await.unwrap(),
        Some(DriverCommand::Absent)
    );
    match source.next_command().await {
        Err(NeuroStrideError::Input { line, .. }) => assert_eq!(line, 2),
        other => panic!("Expected input error, got {:?}", other),
    }
    assert_eq!(
        source.next_command().await.unwrap(),
        Some(DriverCommand::Reset)
    );
}

#[tokio::test]
async fn test_run_reports_every_tick_and_summary() {
    let trajectory = [
        160.0, 145.0, 130.0, 115.0, 100.0, 85.0, 75.0, 75.0, 75.0, 75.0, 90.0, 105.0, 120.0,
        135.0, 150.0, 160.0, 160.0, 160.0, 160.0, 160.0,
    ];
    let input: String = trajectory
        .iter()
        .map(|&angle| frame_line(angle) + "\n")
        .collect();

    let mut orchestrator = orchestrator(EventBus::new(64));
    let mut source = JsonLinesSource::new(input.as_bytes());
    let mut output = Vec::new();
    let summary = orchestrator.run(&mut source, &mut output).await.unwrap();

    let records = parse_output(&output);
    assert_eq!(records.len(), trajectory.len() + 1);
    assert_eq!(orchestrator.ticks_written(), trajectory.len() as u64);

    let reps: Vec<&Value> = records.iter().filter(|r| !r["rep"].is_null()).collect();
    assert_eq!(reps.len(), 1);
    assert_eq!(reps[0]["type"], "tick");
    assert_eq!(reps[0]["tick"], 16);
    assert_eq!(reps[0]["rep"]["number"], 1);
    assert_eq!(reps[0]["accuracy_percent"], 100.0);

    let first = &records[0];
    assert_eq!(first["mode"], "squat");
    assert_eq!(first["phase"], "up");
    assert!(first["metrics"]["knee_angle_avg"].as_f64().is_some());

    let last = records.last().unwrap();
    assert_eq!(last["type"], "summary");
    assert_eq!(last["ticks"], 20);
    assert_eq!(last["stats"]["total"], 1);
    assert_eq!(last["stats"]["good"], 1);

    assert_eq!(summary.ticks, 20);
    assert_eq!(summary.stats.total, 1);
    assert_eq!(summary.accuracy_percent, Some(100.0));
}

#[tokio::test]
async fn test_absent_tick_reports_null_metrics() {
    let mut orchestrator = orchestrator(EventBus::new(16));
    let mut source = JsonLinesSource::new("{\"type\":\"absent\"}\n".as_bytes());
    let mut output = Vec::new();
    orchestrator.run(&mut source, &mut output).await.unwrap();

    let records = parse_output(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["tick"], 1);
    assert!(records[0]["metrics"].is_null());
    assert!(records[0]["highlight"].is_null());
    assert!(records[0]["accuracy_percent"].is_null());
}

#[tokio::test]
async fn test_lenient_input_skips_bad_lines() {
    let input = "garbage\n{\"type\":\"absent\"}\n{\"type\":\"jump\"}\n";
    let mut orchestrator = orchestrator(EventBus::new(16));
    let mut source = JsonLinesSource::new(input.as_bytes());
    let mut output = Vec::new();

    let summary = orchestrator.run(&mut source, &mut output).await.unwrap();

    assert_eq!(orchestrator.skipped_lines(), 2);
    assert_eq!(summary.ticks, 1);
    assert_eq!(parse_output(&output).len(), 2);
}

#[tokio::test]
async fn test_strict_input_fails_on_bad_line() {
    let input = "{\"type\":\"absent\"}\ngarbage\n{\"type\":\"absent\"}\n";
    let mut orchestrator = orchestrator(EventBus::new(16)).with_strict_input(true);
    let mut source = JsonLinesSource::new(input.as_bytes());
    let mut output = Vec::new();

    match orchestrator.run(&mut source, &mut output).await {
        Err(NeuroStrideError::Input { line, .. }) => assert_eq!(line, 2),
        other => panic!("Expected input error, got {:?}", other),
    }
    // The first tick was already reported
    assert_eq!(parse_output(&output).len(), 1);
}

#[tokio::test]
async fn test_control_commands_publish_events() {
    let event_bus = EventBus::new(32);
    let mut receiver = event_bus.subscribe();
    let mut orchestrator = orchestrator(event_bus);

    let input = format!(
        concat!(
            "{{\"type\":\"absent\"}}\n",
            "{{\"type\":\"mode\",\"mode\":\"walk\"}}\n",
            "{{\"type\":\"mode\",\"mode\":\"walk\"}}\n",
            "{}\n",
            "{{\"type\":\"reset\"}}\n",
        ),
        frame_line(170.0)
    );
    let mut source = JsonLinesSource::new(input.as_bytes());
    let mut output = Vec::new();
    let summary = orchestrator.run(&mut source, &mut output).await.unwrap();

    let types: Vec<&str> = drain(&mut receiver)
        .iter()
        .map(|e| e.event_type())
        .collect();
    assert_eq!(
        types,
        vec![
            "subject_lost",
            "mode_changed",
            "subject_acquired",
            "session_reset",
            "shutdown_requested",
        ]
    );

    assert_eq!(summary.mode, ExerciseMode::Walk);
    assert_eq!(summary.ticks, 0);
    assert_eq!(orchestrator.engine().mode(), ExerciseMode::Walk);

    let records = parse_output(&output);
    assert_eq!(records[1]["mode"], "walk");
    assert_eq!(records[1]["tick"], 1);
}

#[tokio::test]
async fn test_rep_completion_is_published() {
    let event_bus = EventBus::new(64);
    let mut receiver = event_bus.subscribe();
    let mut orchestrator = orchestrator(event_bus);

    let input: String = [160.0, 160.0, 70.0, 70.0, 70.0, 70.0, 160.0, 160.0, 160.0, 160.0]
        .iter()
        .map(|&angle| frame_line(angle) + "\n")
        .collect();
    let mut source = JsonLinesSource::new(input.as_bytes());
    let mut output = Vec::new();
    orchestrator.run(&mut source, &mut output).await.unwrap();

    let reps: Vec<CoachEvent> = drain(&mut receiver)
        .into_iter()
        .filter(|e| e.event_type() == "rep_completed")
        .collect();
    assert_eq!(reps.len(), 1);
    match &reps[0] {
        CoachEvent::RepCompleted { session_id, rep } => {
            assert_eq!(*session_id, orchestrator.engine().session_id());
            assert_eq!(rep.number, 1);

            // The tick report that carried the rep names the same session
            let records = parse_output(&output);
            let rep_tick = records.iter().find(|r| !r["rep"].is_null()).unwrap();
            assert_eq!(rep_tick["session_id"], session_id.to_string());
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_mode_and_reset_events_name_the_new_session() {
    let event_bus = EventBus::new(16);
    let mut receiver = event_bus.subscribe();
    let mut orchestrator = orchestrator(event_bus);
    let original = orchestrator.engine().session_id();

    let switched = orchestrator
        .handle_command(DriverCommand::Mode {
            mode: ExerciseMode::Walk,
        })
        .await;
    assert!(switched.is_none());
    let after_switch = orchestrator.engine().session_id();

    orchestrator.handle_command(DriverCommand::Reset).await;
    let after_reset = orchestrator.engine().session_id();

    let events = drain(&mut receiver);
    assert_eq!(
        events,
        vec![
            CoachEvent::ModeChanged {
                from: ExerciseMode::Squat,
                to: ExerciseMode::Walk,
                session_id: after_switch,
            },
            CoachEvent::SessionReset {
                session_id: after_reset,
            },
        ]
    );
    assert_ne!(original, after_switch);
    assert_ne!(after_switch, after_reset);
}

#[tokio::test]
async fn test_shutdown_request_stops_run() {
    let event_bus = EventBus::new(16);
    let mut receiver = event_bus.subscribe();
    let mut orchestrator = orchestrator(event_bus);
    let handle = orchestrator.shutdown_handle();

    // A reader that never yields a line
    let (_writer_half, reader_half) = tokio::io::duplex(64);
    let mut source = JsonLinesSource::new(reader_half);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.request(ShutdownReason::Signal("SIGINT".to_string()));
    });

    let mut output = Vec::new();
    let summary = timeout(
        Duration::from_secs(2),
        orchestrator.run(&mut source, &mut output),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.ticks, 0);
    let records = parse_output(&output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["type"], "summary");

    match drain(&mut receiver).last() {
        Some(CoachEvent::ShutdownRequested { reason }) => assert_eq!(reason, "signal SIGINT"),
        other => panic!("Unexpected event: {:?}", other),
    }
    assert!(orchestrator.shutdown_handle().is_requested());
}

#[test]
fn test_shutdown_handle_keeps_first_reason() {
    let handle = ShutdownHandle::new(CancellationToken::new());
    assert!(!handle.is_requested());
    assert_eq!(handle.reason(), None);

    handle.request(ShutdownReason::Signal("SIGTERM".to_string()));
    handle.request(ShutdownReason::InputExhausted);

    assert!(handle.is_requested());
    assert_eq!(
        handle.reason(),
        Some(ShutdownReason::Signal("SIGTERM".to_string()))
    );
}

#[tokio::test]
async fn test_event_logger_counts_events() {
    let event_bus = EventBus::new(16);
    let token = CancellationToken::new();
    let logger = spawn_event_logger(&event_bus, EventFilter::All, token.clone());

    event_bus
        .publish(CoachEvent::SubjectAcquired { tick: 1 })
        .await
        .unwrap();
    event_bus
        .publish(CoachEvent::SubjectLost { tick: 2 })
        .await
        .unwrap();
    token.cancel();

    let seen = timeout(Duration::from_secs(1), logger)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn test_lifecycle_logger_ignores_presence_events() {
    let event_bus = EventBus::new(16);
    let token = CancellationToken::new();
    let logger = spawn_event_logger(&event_bus, lifecycle_events(), token.clone());

    event_bus
        .publish(CoachEvent::SubjectAcquired { tick: 1 })
        .await
        .unwrap();
    event_bus
        .publish(CoachEvent::SessionReset {
            session_id: uuid::Uuid::new_v4(),
        })
        .await
        .unwrap();
    event_bus
        .publish(CoachEvent::SubjectLost { tick: 2 })
        .await
        .unwrap();
    token.cancel();

    let seen = timeout(Duration::from_secs(1), logger)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, 1);
}
