//! The per-session relay task
//!
//! Owns the tick path: parse → calculate → push to viewer → hand to
//! persistence. Runs until the engine stream ends, the idle timeout
//! fires, or the manager signals shutdown. Frames are forwarded in
//! arrival order and never duplicated; out-of-order input from an engine
//! is not corrected.

use std::time::Duration;

use contracts::{
    ControlOp, ControlRequest, RawStepPayload, StepRecord, StepStore, TaskId, TickMessage,
    ViewerCommand,
};
use metrics::counter;
use persistence::TaskRecorder;
use statistics::StatisticsPipeline;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::manager::SessionManager;

pub(crate) struct RelayContext<S: StepStore + Send + Sync + 'static> {
    pub task_id: TaskId,
    pub engine_rx: mpsc::Receiver<RawStepPayload>,
    pub command_rx: mpsc::Receiver<ViewerCommand>,
    pub viewer_tx: mpsc::Sender<TickMessage>,
    pub control_tx: mpsc::Sender<ControlRequest>,
    pub pipeline: StatisticsPipeline,
    pub recorder: TaskRecorder<S>,
    pub idle_timeout: Duration,
    pub shutdown_rx: watch::Receiver<bool>,
    pub manager: SessionManager,
}

enum Outcome {
    /// Engine stream ended
    Completed,
    /// No frame or command within the idle window
    TimedOut,
    /// Manager-initiated close
    Shutdown,
}

pub(crate) async fn run<S: StepStore + Send + Sync + 'static>(mut ctx: RelayContext<S>) {
    let mut last_activity = Instant::now();
    let mut viewer_open = true;
    let mut streaming = false;

    debug!(task_id = %ctx.task_id, "relay started");

    let outcome = loop {
        let idle_deadline = last_activity + ctx.idle_timeout;

        tokio::select! {
            maybe_raw = ctx.engine_rx.recv() => match maybe_raw {
                Some(raw) => {
                    last_activity = Instant::now();
                    match statistics::parse_step(&raw) {
                        Ok(frame) => {
                            if !streaming {
                                ctx.manager.mark_streaming(&ctx.task_id);
                                streaming = true;
                            }

                            let stats = ctx.pipeline.process(&frame);
                            let record = StepRecord {
                                frame: frame.clone(),
                                stats: stats.clone(),
                            };

                            if viewer_open
                                && ctx.viewer_tx.send(TickMessage { frame, stats }).await.is_err()
                            {
                                viewer_open = false;
                                debug!(task_id = %ctx.task_id, "viewer gone, relaying without viewer");
                            }

                            ctx.recorder.record(record).await;
                            counter!("traffic_orchestrator_steps_relayed_total").increment(1);
                        }
                        Err(e) => {
                            counter!("traffic_orchestrator_frame_parse_errors_total").increment(1);
                            warn!(task_id = %ctx.task_id, error = %e, "unparsable step payload dropped");
                        }
                    }
                }
                None => break Outcome::Completed,
            },

            maybe_cmd = ctx.command_rx.recv() => match maybe_cmd {
                Some(cmd) => {
                    last_activity = Instant::now();
                    let request = ControlRequest::from_viewer(ctx.task_id.clone(), cmd);
                    if ctx.control_tx.send(request).await.is_err() {
                        warn!(task_id = %ctx.task_id, "control channel closed, command dropped");
                    }
                }
                // Command senders only vanish during teardown
                None => break Outcome::Shutdown,
            },

            changed = ctx.shutdown_rx.changed() => {
                if changed.is_err() || *ctx.shutdown_rx.borrow() {
                    break Outcome::Shutdown;
                }
            }

            _ = tokio::time::sleep_until(idle_deadline) => break Outcome::TimedOut,
        }
    };

    // Flush persistence before reporting; new frames are already cut off.
    let steps = ctx.recorder.finish().await;

    // Leave the active set before reporting, so whoever handles the
    // report observes the session as gone.
    ctx.manager.remove(&ctx.task_id);

    match outcome {
        Outcome::Completed => {
            info!(task_id = %ctx.task_id, steps, "engine stream ended, session complete");
            let report = ControlRequest::new(ctx.task_id.clone(), ControlOp::Completed);
            let _ = ctx.control_tx.send(report).await;
        }
        Outcome::TimedOut => {
            warn!(task_id = %ctx.task_id, steps, "session idle timeout, force closing");
            let report = ControlRequest::new(ctx.task_id.clone(), ControlOp::TimedOut);
            let _ = ctx.control_tx.send(report).await;
        }
        Outcome::Shutdown => {
            debug!(task_id = %ctx.task_id, steps, "relay shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SessionState;
    use contracts::{
        PersistenceConfig, PersistenceMode, SessionConfig, SimulationTask, StatisticsConfig,
        StepCallback, TaskConfig,
    };
    use persistence::{JsonDocumentStore, WriterPool};
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        manager: SessionManager,
        callback: StepCallback,
        viewer_rx: Option<mpsc::Receiver<TickMessage>>,
        control_rx: mpsc::Receiver<ControlRequest>,
        pool: WriterPool<JsonDocumentStore>,
        dir: TempDir,
    }

    fn session_config(idle_timeout_secs: u64) -> SessionConfig {
        SessionConfig {
            idle_timeout_secs,
            ..Default::default()
        }
    }

    fn setup(idle_timeout_secs: u64, take_viewer_now: bool) -> Harness {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(session_config(idle_timeout_secs));
        let task_id: TaskId = "t1".into();
        manager.prepare(task_id.clone()).unwrap();

        let viewer_rx = take_viewer_now.then(|| manager.take_viewer(&task_id).unwrap());

        let store = JsonDocumentStore::new("docs", dir.path()).unwrap();
        let pool = WriterPool::spawn(
            store,
            &PersistenceConfig {
                workers: 2,
                ..Default::default()
            },
        );
        let task = SimulationTask::new(
            task_id.clone(),
            "owner-1".into(),
            "/maps/town.net".to_string(),
            TaskConfig::default(),
        );
        let recorder = TaskRecorder::new(task, PersistenceMode::Incremental, pool.handle());
        let pipeline = StatisticsPipeline::new(&StatisticsConfig::default());

        let (control_tx, control_rx) = mpsc::channel(16);
        let callback = manager
            .bind_engine(&task_id, pipeline, recorder, control_tx)
            .unwrap();

        Harness {
            manager,
            callback,
            viewer_rx,
            control_rx,
            pool,
            dir,
        }
    }

    fn payload(step: u64, ids: &[&str]) -> RawStepPayload {
        let vehicles: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "speed": 9.0, "acceleration": 0.1}))
            .collect();
        let body = json!({"step": step, "timestamp": step as f64 * 0.1, "vehicles": vehicles});
        RawStepPayload::new("t1".into(), body.to_string())
    }

    #[tokio::test]
    async fn test_frames_relayed_in_order_no_duplicates() {
        let mut h = setup(1800, true);

        for step in 0..50u64 {
            (h.callback)(payload(step, &["a", "b"]));
        }
        // Close the engine stream
        drop(h.callback);

        let mut viewer_rx = h.viewer_rx.take().unwrap();
        let mut seen = Vec::new();
        while let Some(msg) = viewer_rx.recv().await {
            assert_eq!(msg.frame.step, msg.stats.step);
            seen.push(msg.frame.step);
        }
        assert_eq!(seen, (0..50).collect::<Vec<_>>());

        // Session reported completion and removed itself
        let report = h.control_rx.recv().await.unwrap();
        assert_eq!(report.op, ControlOp::Completed);
        assert_eq!(h.manager.active_count(), 0);

        // All 50 steps persisted
        h.pool.shutdown().await;
        let reader = JsonDocumentStore::new("reader", h.dir.path()).unwrap();
        let doc = reader.load(&"t1".into()).unwrap().unwrap();
        assert_eq!(doc.total_steps, 50);
        assert!(doc.end_time >= doc.start_time);
    }

    #[tokio::test]
    async fn test_viewer_attaches_after_first_frames() {
        let mut h = setup(1800, false);

        // Frames arrive before any viewer exists
        for step in 0..5u64 {
            (h.callback)(payload(step, &["a"]));
        }
        // Let the relay push them into the buffer allocated at prepare time
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Late attach still sees the stream from the beginning
        let mut viewer_rx = h.manager.take_viewer(&"t1".into()).unwrap();
        for expected in 0..5u64 {
            assert_eq!(viewer_rx.recv().await.unwrap().frame.step, expected);
        }

        drop(h.callback);
        assert_eq!(h.control_rx.recv().await.unwrap().op, ControlOp::Completed);
        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_unparsable_payload_dropped_stream_continues() {
        let mut h = setup(1800, true);

        (h.callback)(payload(0, &["a"]));
        (h.callback)(RawStepPayload::new("t1".into(), "{broken".to_string()));
        (h.callback)(RawStepPayload::new(
            "t1".into(),
            r#"{"no_step_key": true}"#.to_string(),
        ));
        (h.callback)(payload(1, &["a"]));
        drop(h.callback);

        let mut viewer_rx = h.viewer_rx.take().unwrap();
        let mut steps = Vec::new();
        while let Some(msg) = viewer_rx.recv().await {
            steps.push(msg.frame.step);
        }
        assert_eq!(steps, vec![0, 1]);
        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_viewer_commands_translate_to_control_requests() {
        let mut h = setup(1800, true);

        let commands = h.manager.command_sender(&"t1".into()).unwrap();
        commands.send(ViewerCommand::Pause).await.unwrap();
        commands
            .send(ViewerCommand::SetStep { step: 42 })
            .await
            .unwrap();

        let first = h.control_rx.recv().await.unwrap();
        assert_eq!(first.op, ControlOp::Pause);
        assert_eq!(first.task_id, "t1");
        let second = h.control_rx.recv().await.unwrap();
        assert_eq!(second.op, ControlOp::SetStep(42));

        h.manager.close(&"t1".into()).await;
        h.pool.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_reports_and_removes() {
        let mut h = setup(1800, true);

        // No frames, no commands: the paused clock jumps to the deadline
        let report = h.control_rx.recv().await.unwrap();
        assert_eq!(report.op, ControlOp::TimedOut);
        assert_eq!(h.manager.active_count(), 0);
        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let h = setup(1800, true);

        assert_eq!(h.manager.state(&"t1".into()), Some(SessionState::Bound));
        assert!(h.manager.close(&"t1".into()).await);
        assert!(!h.manager.close(&"t1".into()).await);
        assert_eq!(h.manager.active_count(), 0);
        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_streaming_state_after_first_frame() {
        let mut h = setup(1800, true);

        (h.callback)(payload(0, &["a"]));
        let msg = h.viewer_rx.as_mut().unwrap().recv().await.unwrap();
        assert_eq!(msg.frame.step, 0);
        assert_eq!(h.manager.state(&"t1".into()), Some(SessionState::Streaming));

        h.manager.close(&"t1".into()).await;
        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_statistics_flow_through_relay() {
        let mut h = setup(1800, true);

        (h.callback)(payload(0, &["1", "2", "3"]));
        (h.callback)(payload(1, &["2", "3", "4"]));
        drop(h.callback);

        let mut viewer_rx = h.viewer_rx.take().unwrap();
        let first = viewer_rx.recv().await.unwrap();
        assert_eq!(first.stats.car_in, 3);
        assert_eq!(first.stats.car_number, 3);

        let second = viewer_rx.recv().await.unwrap();
        assert_eq!(second.stats.car_in, 1);
        assert_eq!(second.stats.car_out, 1);
        assert_eq!(second.stats.car_number, 3);
        assert_eq!(second.stats.total_in, 4);
        assert_eq!(second.stats.total_out, 1);
        h.pool.shutdown().await;
    }
}
