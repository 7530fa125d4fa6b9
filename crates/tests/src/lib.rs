//! # Integration Tests
//!
//! Cross-crate end-to-end tests, wired the same way the CLI wires the
//! service: registry + dispatcher + session manager + statistics +
//! writer pool, driven by mock engines. No network required.

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ControlOp, ControlRequest, PersistenceConfig, PersistenceMode, SessionConfig,
        SimulationTask, StatisticsConfig, TaskConfig, TaskId, TaskMetadataStore, TaskStatus,
    };
    use dispatcher::{DispatchError, EngineRegistry, InMemoryTaskStore, TaskDispatcher};
    use engine_client::{MockEngineClient, MockEngineSettings};
    use persistence::{JsonDocumentStore, TaskRecorder, WriterPool};
    use session::SessionManager;
    use statistics::StatisticsPipeline;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct TestRig {
        dispatcher: Arc<TaskDispatcher<MockEngineClient, InMemoryTaskStore>>,
        meta: Arc<InMemoryTaskStore>,
        sessions: SessionManager,
        pool: WriterPool<JsonDocumentStore>,
        control_tx: mpsc::Sender<ControlRequest>,
        dir: TempDir,
    }

    /// Wire the whole service against mock engines, the way the CLI does.
    async fn build_rig(engines: Vec<(&str, MockEngineSettings)>) -> TestRig {
        let dir = tempfile::tempdir().unwrap();

        let registry = EngineRegistry::new();
        for (id, settings) in engines {
            let client = MockEngineClient::with_settings(settings);
            registry
                .register(id.into(), vec![format!("inproc://{id}")], client)
                .await;
        }

        let meta = Arc::new(InMemoryTaskStore::new());
        let dispatcher = Arc::new(TaskDispatcher::new(registry, meta.clone()));
        let sessions = SessionManager::new(SessionConfig::default());

        let store = JsonDocumentStore::new("docs", dir.path()).unwrap();
        let pool = WriterPool::spawn(
            store,
            &PersistenceConfig {
                workers: 2,
                ..Default::default()
            },
        );

        // Control loop: session requests -> dispatcher calls
        let (control_tx, mut control_rx) = mpsc::channel::<ControlRequest>(16);
        {
            let dispatcher = dispatcher.clone();
            let sessions = sessions.clone();
            tokio::spawn(async move {
                while let Some(request) = control_rx.recv().await {
                    let task_id = request.task_id.clone();
                    let lifecycle =
                        matches!(request.op, ControlOp::Completed | ControlOp::TimedOut);
                    let _ = dispatcher.control(&task_id, request.op).await;
                    if lifecycle {
                        sessions.close(&task_id).await;
                    }
                }
            });
        }

        TestRig {
            dispatcher,
            meta,
            sessions,
            pool,
            control_tx,
            dir,
        }
    }

    fn engine_settings(id: &str, vehicles: usize) -> MockEngineSettings {
        MockEngineSettings {
            instance_id: id.into(),
            tick_interval: Duration::from_millis(2),
            vehicles_per_frame: vehicles,
            ..Default::default()
        }
    }

    fn make_task(id: &str, steps: u64) -> SimulationTask {
        SimulationTask::new(
            id.into(),
            "owner-9".into(),
            "/maps/grid.net.json".to_string(),
            TaskConfig {
                map_id: "grid".to_string(),
                total_steps: Some(steps),
                params: Default::default(),
            },
        )
    }

    /// Start a prepared task: bind the session, submit to an engine.
    async fn start_task(rig: &TestRig, task: &SimulationTask, mode: PersistenceMode) {
        let recorder = TaskRecorder::new(task.clone(), mode, rig.pool.handle());
        let pipeline = StatisticsPipeline::new(&StatisticsConfig::default());
        let callback = rig
            .sessions
            .bind_engine(&task.task_id, pipeline, recorder, rig.control_tx.clone())
            .unwrap();
        rig.dispatcher.submit(task, callback).await.unwrap();
    }

    /// Poll until the task reaches the expected terminal status.
    async fn wait_for_status(rig: &TestRig, task_id: &TaskId, expected: TaskStatus) {
        for _ in 0..500 {
            if rig.meta.status_of(task_id) == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "task {task_id} never reached {expected}, got {:?}",
            rig.meta.status_of(task_id)
        );
    }

    /// prepare -> bind -> engine streams steps 0..99 with vehicle ids
    /// cycling in/out -> persisted record has total_steps = 100 and
    /// end_time >= start_time.
    #[tokio::test]
    async fn test_e2e_stream_statistics_and_persistence() {
        let rig = build_rig(vec![("e1", engine_settings("e1", 5))]).await;

        let task = make_task("t-e2e", 100);
        rig.meta.create_task(&task).await.unwrap();
        rig.sessions.prepare(task.task_id.clone()).unwrap();
        let mut viewer = rig.sessions.take_viewer(&task.task_id).unwrap();

        start_task(&rig, &task, PersistenceMode::Incremental).await;
        assert_eq!(
            rig.meta.status_of(&task.task_id),
            Some(TaskStatus::Running)
        );

        // Viewer sees every step exactly once, in order
        let mut steps = Vec::new();
        let mut last_stats = None;
        while let Some(msg) = viewer.recv().await {
            steps.push(msg.frame.step);
            last_stats = Some(msg.stats);
        }
        assert_eq!(steps, (0..100).collect::<Vec<_>>());

        // Mock vehicles cycle one id per tick
        let last = last_stats.unwrap();
        assert_eq!(last.car_number, 5);
        assert_eq!(last.car_in, 1);
        assert_eq!(last.car_out, 1);
        assert_eq!(last.total_in, 5 + 99);
        assert_eq!(last.total_out, 99);
        assert!(last.jam_index > 0.0 && last.jam_index < 1.0);

        // Session reported completion; dispatcher finished the task
        wait_for_status(&rig, &task.task_id, TaskStatus::Finished).await;
        assert_eq!(rig.sessions.active_count(), 0);

        // Persisted document
        rig.pool.shutdown().await;
        let reader = JsonDocumentStore::new("reader", rig.dir.path()).unwrap();
        let doc = reader.load(&task.task_id).unwrap().unwrap();
        assert_eq!(doc.total_steps, 100);
        assert_eq!(doc.owner_id, "owner-9");
        assert!(doc.end_time >= doc.start_time);
        assert_eq!(doc.steps.len(), 100);
        assert_eq!(doc.steps[99].frame.step, 99);
    }

    /// Batch mode writes one document at session close.
    #[tokio::test]
    async fn test_e2e_batch_mode_document() {
        let rig = build_rig(vec![("e1", engine_settings("e1", 3))]).await;

        let task = make_task("t-batch", 30);
        rig.meta.create_task(&task).await.unwrap();
        rig.sessions.prepare(task.task_id.clone()).unwrap();
        let mut viewer = rig.sessions.take_viewer(&task.task_id).unwrap();

        start_task(&rig, &task, PersistenceMode::Batch).await;
        while viewer.recv().await.is_some() {}

        wait_for_status(&rig, &task.task_id, TaskStatus::Finished).await;
        rig.pool.shutdown().await;

        let reader = JsonDocumentStore::new("reader", rig.dir.path()).unwrap();
        let doc = reader.load(&task.task_id).unwrap().unwrap();
        assert_eq!(doc.total_steps, 30);
        assert_eq!(doc.steps.len(), 30);
    }

    /// stop twice: the task stops once, the second call is a STATE
    /// error with no side effects.
    #[tokio::test]
    async fn test_e2e_stop_idempotence() {
        let rig = build_rig(vec![(
            "e1",
            MockEngineSettings {
                default_total_steps: 0, // run until stopped
                ..engine_settings("e1", 4)
            },
        )])
        .await;

        let mut task = make_task("t-stop", 0);
        task.config.total_steps = None;
        rig.meta.create_task(&task).await.unwrap();
        rig.sessions.prepare(task.task_id.clone()).unwrap();
        let mut viewer = rig.sessions.take_viewer(&task.task_id).unwrap();

        start_task(&rig, &task, PersistenceMode::Incremental).await;

        // Let some frames through, then stop
        for _ in 0..5 {
            viewer.recv().await.unwrap();
        }
        rig.dispatcher
            .control(&task.task_id, ControlOp::Stop)
            .await
            .unwrap();
        assert_eq!(rig.meta.status_of(&task.task_id), Some(TaskStatus::Stopped));

        let err = rig
            .dispatcher
            .control(&task.task_id, ControlOp::Stop)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::TaskNotFound { .. }));
        assert_eq!(rig.meta.status_of(&task.task_id), Some(TaskStatus::Stopped));

        // Stream ends after the engine stops ticking
        while viewer.recv().await.is_some() {}
        rig.pool.shutdown().await;
    }

    /// Two tasks on two engines run concurrently with isolated
    /// sessions, buffers, and documents.
    #[tokio::test]
    async fn test_e2e_concurrent_sessions_isolated() {
        let rig = build_rig(vec![
            ("e1", engine_settings("e1", 2)),
            ("e2", engine_settings("e2", 7)),
        ])
        .await;

        let task_a = make_task("t-a", 40);
        let task_b = make_task("t-b", 40);
        for task in [&task_a, &task_b] {
            rig.meta.create_task(task).await.unwrap();
            rig.sessions.prepare(task.task_id.clone()).unwrap();
        }
        let mut viewer_a = rig.sessions.take_viewer(&task_a.task_id).unwrap();
        let mut viewer_b = rig.sessions.take_viewer(&task_b.task_id).unwrap();

        start_task(&rig, &task_a, PersistenceMode::Incremental).await;
        start_task(&rig, &task_b, PersistenceMode::Incremental).await;

        // Each task is bound to its own instance
        let bound_a = rig.dispatcher.bound_instance(&task_a.task_id).await.unwrap();
        let bound_b = rig.dispatcher.bound_instance(&task_b.task_id).await.unwrap();
        assert_ne!(bound_a, bound_b);

        let consume_a = async {
            let mut last = None;
            while let Some(msg) = viewer_a.recv().await {
                last = Some(msg.stats);
            }
            last.unwrap()
        };
        let consume_b = async {
            let mut last = None;
            while let Some(msg) = viewer_b.recv().await {
                last = Some(msg.stats);
            }
            last.unwrap()
        };
        let (stats_a, stats_b) = tokio::join!(consume_a, consume_b);

        // Per-session buffers never leaked into each other
        assert_eq!(stats_a.car_number, 2);
        assert_eq!(stats_b.car_number, 7);
        assert_eq!(stats_a.total_in, 2 + 39);
        assert_eq!(stats_b.total_in, 7 + 39);

        wait_for_status(&rig, &task_a.task_id, TaskStatus::Finished).await;
        wait_for_status(&rig, &task_b.task_id, TaskStatus::Finished).await;

        rig.pool.shutdown().await;
        let reader = JsonDocumentStore::new("reader", rig.dir.path()).unwrap();
        assert_eq!(
            reader.load(&task_a.task_id).unwrap().unwrap().total_steps,
            40
        );
        assert_eq!(
            reader.load(&task_b.task_id).unwrap().unwrap().total_steps,
            40
        );
    }

    /// Submission with no registered engines leaves the task Created.
    #[tokio::test]
    async fn test_e2e_no_engine_no_submission() {
        let rig = build_rig(vec![]).await;

        let task = make_task("t-none", 10);
        rig.meta.create_task(&task).await.unwrap();
        rig.sessions.prepare(task.task_id.clone()).unwrap();

        let recorder = TaskRecorder::new(
            task.clone(),
            PersistenceMode::Incremental,
            rig.pool.handle(),
        );
        let pipeline = StatisticsPipeline::new(&StatisticsConfig::default());
        let callback = rig
            .sessions
            .bind_engine(&task.task_id, pipeline, recorder, rig.control_tx.clone())
            .unwrap();

        let err = rig.dispatcher.submit(&task, callback).await.unwrap_err();
        assert!(matches!(err, DispatchError::EngineUnavailable));
        assert_eq!(rig.meta.status_of(&task.task_id), Some(TaskStatus::Created));

        rig.sessions.close(&task.task_id).await;
        rig.pool.shutdown().await;
    }
}
