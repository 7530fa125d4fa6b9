//! SessionManager - session lifecycle and channel ownership
//!
//! Exactly one session per active task id. The manager owns both channel
//! ends until they are handed out: the viewer receiver to the (single)
//! viewer, the command receiver and engine receiver to the relay task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use contracts::{
    ControlRequest, RawStepPayload, SessionConfig, StepCallback, StepStore, TaskId, TickMessage,
    ViewerCommand,
};
use metrics::{counter, gauge};
use persistence::TaskRecorder;
use statistics::StatisticsPipeline;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::SessionError;
use crate::relay::{self, RelayContext};

/// Viewer-command channel capacity; commands are small and rare
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created; viewer slot open, no engine yet
    Prepared,
    /// Engine stream attached, relay running
    Bound,
    /// First frame relayed
    Streaming,
}

pub(crate) struct SessionEntry {
    state: SessionState,
    viewer_tx: mpsc::Sender<TickMessage>,
    viewer_rx: Option<mpsc::Receiver<TickMessage>>,
    command_tx: mpsc::Sender<ViewerCommand>,
    command_rx: Option<mpsc::Receiver<ViewerCommand>>,
    shutdown_tx: watch::Sender<bool>,
    relay: Option<JoinHandle<()>>,
}

struct Inner {
    sessions: Mutex<HashMap<TaskId, SessionEntry>>,
    config: SessionConfig,
}

/// Manages the active-session set
///
/// Cloning shares the same set.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Create a session in `Prepared` state.
    ///
    /// Allocates the viewer channel immediately so frames relayed before
    /// the viewer attaches are buffered, not lost.
    #[instrument(name = "session_prepare", skip(self), fields(task_id = %task_id))]
    pub fn prepare(&self, task_id: TaskId) -> Result<(), SessionError> {
        let mut sessions = self.inner.sessions.lock().unwrap();
        if sessions.contains_key(&task_id) {
            return Err(SessionError::AlreadyPrepared { task_id });
        }

        let (viewer_tx, viewer_rx) = mpsc::channel(self.inner.config.viewer_channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        sessions.insert(
            task_id.clone(),
            SessionEntry {
                state: SessionState::Prepared,
                viewer_tx,
                viewer_rx: Some(viewer_rx),
                command_tx,
                command_rx: Some(command_rx),
                shutdown_tx,
                relay: None,
            },
        );
        gauge!("traffic_orchestrator_active_sessions").set(sessions.len() as f64);
        info!(task_id = %task_id, "session prepared");
        Ok(())
    }

    /// Hand the viewer receiver out; works exactly once per session.
    pub fn take_viewer(
        &self,
        task_id: &TaskId,
    ) -> Result<mpsc::Receiver<TickMessage>, SessionError> {
        let mut sessions = self.inner.sessions.lock().unwrap();
        let entry = sessions
            .get_mut(task_id)
            .ok_or_else(|| SessionError::NotFound {
                task_id: task_id.clone(),
            })?;
        entry.viewer_rx.take().ok_or_else(|| SessionError::ViewerTaken {
            task_id: task_id.clone(),
        })
    }

    /// Clonable sender for viewer control messages.
    pub fn command_sender(
        &self,
        task_id: &TaskId,
    ) -> Result<mpsc::Sender<ViewerCommand>, SessionError> {
        let sessions = self.inner.sessions.lock().unwrap();
        sessions
            .get(task_id)
            .map(|entry| entry.command_tx.clone())
            .ok_or_else(|| SessionError::NotFound {
                task_id: task_id.clone(),
            })
    }

    /// Attach the engine stream and start the relay task.
    ///
    /// Returns the `StepCallback` to pass into the engine submission;
    /// it bridges the engine's push side into the session's bounded
    /// inbound channel.
    #[instrument(name = "session_bind_engine", skip(self, pipeline, recorder, control_tx), fields(task_id = %task_id))]
    pub fn bind_engine<S>(
        &self,
        task_id: &TaskId,
        pipeline: StatisticsPipeline,
        recorder: TaskRecorder<S>,
        control_tx: mpsc::Sender<ControlRequest>,
    ) -> Result<StepCallback, SessionError>
    where
        S: StepStore + Send + Sync + 'static,
    {
        let mut sessions = self.inner.sessions.lock().unwrap();
        let entry = sessions
            .get_mut(task_id)
            .ok_or_else(|| SessionError::NotFound {
                task_id: task_id.clone(),
            })?;
        if entry.state != SessionState::Prepared {
            return Err(SessionError::AlreadyBound {
                task_id: task_id.clone(),
            });
        }

        let (engine_tx, engine_rx) =
            mpsc::channel(self.inner.config.engine_channel_capacity);
        let command_rx = entry
            .command_rx
            .take()
            .expect("command receiver present while Prepared");

        let ctx = RelayContext {
            task_id: task_id.clone(),
            engine_rx,
            command_rx,
            viewer_tx: entry.viewer_tx.clone(),
            control_tx,
            pipeline,
            recorder,
            idle_timeout: std::time::Duration::from_secs(self.inner.config.idle_timeout_secs),
            shutdown_rx: entry.shutdown_tx.subscribe(),
            manager: self.clone(),
        };
        entry.relay = Some(tokio::spawn(relay::run(ctx)));
        entry.state = SessionState::Bound;

        debug!(task_id = %task_id, "engine bound, relay started");
        Ok(engine_callback(task_id.clone(), engine_tx))
    }

    /// Close a session: signal the relay, wait for it to flush, release
    /// both channel ends. Double-close is a no-op returning false.
    #[instrument(name = "session_close", skip(self), fields(task_id = %task_id))]
    pub async fn close(&self, task_id: &TaskId) -> bool {
        let entry = {
            let mut sessions = self.inner.sessions.lock().unwrap();
            let entry = sessions.remove(task_id);
            gauge!("traffic_orchestrator_active_sessions").set(sessions.len() as f64);
            entry
        };

        let Some(entry) = entry else {
            return false;
        };

        // Dropping the entry below releases the viewer sender and any
        // unclaimed receivers; signal the relay first and let it flush.
        let _ = entry.shutdown_tx.send(true);
        if let Some(relay) = entry.relay {
            if let Err(e) = relay.await {
                warn!(task_id = %task_id, error = ?e, "relay task panicked");
            }
        }

        counter!("traffic_orchestrator_sessions_closed_total").increment(1);
        info!(task_id = %task_id, "session closed");
        true
    }

    /// Current state of a session, if it exists.
    pub fn state(&self, task_id: &TaskId) -> Option<SessionState> {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .get(task_id)
            .map(|entry| entry.state)
    }

    /// Number of active sessions.
    pub fn active_count(&self) -> usize {
        self.inner.sessions.lock().unwrap().len()
    }

    /// Relay-side transition to `Streaming` on the first frame.
    pub(crate) fn mark_streaming(&self, task_id: &TaskId) {
        let mut sessions = self.inner.sessions.lock().unwrap();
        if let Some(entry) = sessions.get_mut(task_id) {
            entry.state = SessionState::Streaming;
        }
    }

    /// Relay-side removal after a natural end (completed / timed out).
    /// No-op if `close` already removed the entry.
    pub(crate) fn remove(&self, task_id: &TaskId) {
        let mut sessions = self.inner.sessions.lock().unwrap();
        if sessions.remove(task_id).is_some() {
            gauge!("traffic_orchestrator_active_sessions").set(sessions.len() as f64);
            counter!("traffic_orchestrator_sessions_closed_total").increment(1);
        }
    }
}

/// Bridge the engine's push callback into the bounded session channel.
///
/// Never blocks the engine's tick loop: frames that do not fit the
/// bounded channel are dropped and counted.
fn engine_callback(task_id: TaskId, tx: mpsc::Sender<RawStepPayload>) -> StepCallback {
    Arc::new(move |payload| match tx.try_send(payload) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            counter!("traffic_orchestrator_engine_frames_dropped_total").increment(1);
            warn!(task_id = %task_id, "session inbound queue full, frame dropped");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            // Session already closed; late frames are expected during teardown
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use contracts::{
        PersistenceConfig, PersistenceMode, SimulationTask, StatisticsConfig, TaskConfig,
    };
    use persistence::{JsonDocumentStore, WriterPool};
    use tempfile::tempdir;

    #[test]
    fn test_prepare_rejects_duplicate() {
        let manager = SessionManager::new(SessionConfig::default());
        manager.prepare("t1".into()).unwrap();
        let err = manager.prepare("t1".into()).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyPrepared { .. }));
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_take_viewer_exactly_once() {
        let manager = SessionManager::new(SessionConfig::default());
        manager.prepare("t1".into()).unwrap();

        assert!(manager.take_viewer(&"t1".into()).is_ok());
        let err = manager.take_viewer(&"t1".into()).unwrap_err();
        assert!(matches!(err, SessionError::ViewerTaken { .. }));
    }

    #[test]
    fn test_operations_on_unknown_session() {
        let manager = SessionManager::new(SessionConfig::default());
        assert!(matches!(
            manager.take_viewer(&"ghost".into()),
            Err(SessionError::NotFound { .. })
        ));
        assert!(matches!(
            manager.command_sender(&"ghost".into()),
            Err(SessionError::NotFound { .. })
        ));
        assert_eq!(manager.state(&"ghost".into()), None);
    }

    #[tokio::test]
    async fn test_bind_engine_twice_rejected() {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(SessionConfig::default());
        manager.prepare("t1".into()).unwrap();

        let store = JsonDocumentStore::new("docs", dir.path()).unwrap();
        let pool = WriterPool::spawn(store, &PersistenceConfig::default());
        let task = SimulationTask::new(
            "t1".into(),
            "owner".into(),
            "/m".to_string(),
            TaskConfig::default(),
        );

        let (control_tx, _control_rx) = mpsc::channel(8);
        let _callback = manager
            .bind_engine(
                &"t1".into(),
                StatisticsPipeline::new(&StatisticsConfig::default()),
                TaskRecorder::new(task.clone(), PersistenceMode::Batch, pool.handle()),
                control_tx.clone(),
            )
            .unwrap();
        assert_eq!(manager.state(&"t1".into()), Some(SessionState::Bound));

        let err = match manager.bind_engine(
            &"t1".into(),
            StatisticsPipeline::new(&StatisticsConfig::default()),
            TaskRecorder::new(task, PersistenceMode::Batch, pool.handle()),
            control_tx,
        ) {
            Ok(_) => panic!("expected bind_engine to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, SessionError::AlreadyBound { .. }));

        manager.close(&"t1".into()).await;
        pool.shutdown().await;
    }
}
