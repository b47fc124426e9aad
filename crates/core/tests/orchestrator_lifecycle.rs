//! Orchestrator lifecycle integration tests.
//!
//! These tests verify complete task lifecycles through the orchestrator:
//! submit -> strategy attempts / queued downloads -> completion event -> idle

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use linkscout_core::{
    testing::{fixtures, MockDownloader, MockResolveEngine, MockStoppable},
    DownloadError, DownloadOutcome, Downloader, EngineError, EngineRegistry, EventReceiver,
    ExperienceStore, IdentityBuilder, ItemKind, Orchestrator, OrchestratorConfig,
    OrchestratorError, OrchestratorEvent, OrchestratorState, ResolutionResult, ResolveEngine,
    SniffFailure, StrategyKind, TaskDescriptor,
};

/// A URL whose default queue is media -> html -> direct.
const ARTICLE: &str = "https://www.example.com/article";

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    experience: Arc<ExperienceStore>,
    media: Arc<MockResolveEngine>,
    html: Arc<MockResolveEngine>,
    direct: Arc<MockResolveEngine>,
    downloader: Arc<MockDownloader>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let experience = Arc::new(ExperienceStore::load(temp_dir.path().join("experience.json")));

        Self {
            experience,
            media: Arc::new(MockResolveEngine::failing(StrategyKind::MediaExtract)),
            html: Arc::new(MockResolveEngine::failing(StrategyKind::HtmlParse)),
            direct: Arc::new(MockResolveEngine::failing(StrategyKind::DirectLinkCheck)),
            downloader: Arc::new(MockDownloader::new(ItemKind::Direct)),
            _temp_dir: temp_dir,
        }
    }

    fn registry(&self) -> EngineRegistry {
        EngineRegistry::new()
            .with(Arc::clone(&self.media) as Arc<dyn ResolveEngine>)
            .with(Arc::clone(&self.html) as Arc<dyn ResolveEngine>)
            .with(Arc::clone(&self.direct) as Arc<dyn ResolveEngine>)
    }

    fn create_orchestrator(&self) -> (Orchestrator, EventReceiver) {
        self.create_with_registry(self.registry())
    }

    fn create_with_registry(&self, registry: EngineRegistry) -> (Orchestrator, EventReceiver) {
        let config = OrchestratorConfig {
            kill_grace_ms: 500,
            ..Default::default()
        };
        Orchestrator::new(
            config,
            fixtures::scorer_with(Arc::clone(&self.experience)),
            Arc::new(registry),
            Arc::new(IdentityBuilder::with_defaults()),
            vec![Arc::clone(&self.downloader) as Arc<dyn Downloader>],
        )
    }

    fn download_tasks(&self, count: usize) -> Vec<linkscout_core::DownloadTask> {
        (1..=count)
            .map(|i| {
                fixtures::download_task(
                    fixtures::direct_item(&format!("part-{}.zip", i)),
                    Path::new("/tmp/linkscout-test"),
                )
            })
            .collect()
    }
}

/// Collect events until the completion event of `task_id`.
async fn collect_until_completion(
    rx: &mut EventReceiver,
    task_id: &str,
    timeout: Duration,
) -> Vec<OrchestratorEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("timed out waiting for completion event")
            .expect("event channel closed");
        let done = event.is_completion() && event.task_id() == Some(task_id);
        events.push(event);
        if done {
            return events;
        }
    }
}

fn sniff_result(events: &[OrchestratorEvent]) -> ResolutionResult {
    match events.last() {
        Some(OrchestratorEvent::SniffFinished { result, .. }) => result.clone(),
        other => panic!("expected SniffFinished, got {:?}", other),
    }
}

// =============================================================================
// Sniff Tests
// =============================================================================

#[tokio::test]
async fn test_sniff_falls_through_to_first_successful_strategy() {
    let harness = TestHarness::new();
    harness
        .html
        .set_default_resolution(fixtures::resolution("Article", 2))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;
    let result = sniff_result(&events);

    assert!(result.is_success());
    assert_eq!(result.engine_used, Some(StrategyKind::HtmlParse));
    assert_eq!(result.title.as_deref(), Some("Article"));
    assert_eq!(result.items.len(), 2);

    assert_eq!(harness.media.attempt_count().await, 1);
    assert_eq!(harness.html.attempt_count().await, 1);
    assert_eq!(harness.direct.attempt_count().await, 0);

    // experience is keyed by the normalized domain
    assert_eq!(
        harness.experience.success_count("example.com", StrategyKind::HtmlParse),
        1
    );
    assert_eq!(
        harness.experience.success_count("example.com", StrategyKind::MediaExtract),
        0
    );
}

#[tokio::test]
async fn test_experience_is_persisted() {
    let harness = TestHarness::new();
    harness
        .media
        .set_default_resolution(fixtures::resolution("Clip", 1))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    let path = harness.experience.path().expect("store has a path").to_path_buf();
    let reloaded = ExperienceStore::load(&path);
    assert_eq!(reloaded.success_count("example.com", StrategyKind::MediaExtract), 1);
}

#[tokio::test]
async fn test_sniff_exhausted_reports_attempted_strategies() {
    let harness = TestHarness::new();
    harness
        .direct
        .set_next_error(EngineError::Process("HEAD failed".to_string()))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;
    let result = sniff_result(&events);

    match result.error {
        Some(SniffFailure::Exhausted {
            attempted,
            last_error,
        }) => {
            assert_eq!(
                attempted,
                vec![
                    StrategyKind::MediaExtract,
                    StrategyKind::HtmlParse,
                    StrategyKind::DirectLinkCheck
                ]
            );
            assert!(last_error.unwrap().contains("HEAD failed"));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert!(result.items.is_empty());
    assert!(harness.experience.snapshot().is_empty());
}

#[tokio::test]
async fn test_unparsable_url_has_no_strategy() {
    let harness = TestHarness::new();
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff("not a url")).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    assert_eq!(sniff_result(&events).error, Some(SniffFailure::NoStrategy));
    assert_eq!(harness.media.attempt_count().await, 0);
}

#[tokio::test]
async fn test_empty_registry_is_configuration_failure() {
    let harness = TestHarness::new();
    let (orchestrator, mut rx) = harness.create_with_registry(EngineRegistry::new());

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    assert!(matches!(
        sniff_result(&events).error,
        Some(SniffFailure::Configuration(_))
    ));
}

#[tokio::test]
async fn test_missing_tools_are_skipped_and_reported() {
    let harness = TestHarness::new();
    harness
        .media
        .set_next_error(EngineError::MissingBinary {
            path: "/nonexistent/yt-dlp".into(),
        })
        .await;
    let registry =
        EngineRegistry::new().with(Arc::clone(&harness.media) as Arc<dyn ResolveEngine>);
    let (orchestrator, mut rx) = harness.create_with_registry(registry);

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    // media is missing its binary, html and direct have no engine at all
    assert!(matches!(
        sniff_result(&events).error,
        Some(SniffFailure::Configuration(_))
    ));
    let warnings = events
        .iter()
        .filter(|e| matches!(e, OrchestratorEvent::Log { message, .. } if message.contains("unavailable") || message.contains("Configuration problem")))
        .count();
    assert_eq!(warnings, 3);
}

#[tokio::test]
async fn test_stop_cancels_sniff_and_tears_down_session() {
    let harness = TestHarness::new();
    let session = Arc::new(MockStoppable::new("browser session"));
    harness.media.set_delay(Duration::from_secs(30)).await;
    harness.media.set_resource(Arc::clone(&session)).await;
    harness
        .media
        .set_default_resolution(fixtures::resolution("Late", 1))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orchestrator.state(), OrchestratorState::RunningSniff);

    assert!(orchestrator.stop().await);
    assert!(session.is_stopped());

    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;
    assert_eq!(sniff_result(&events).error, Some(SniffFailure::Cancelled));
    assert_eq!(harness.html.attempt_count().await, 0);
    assert!(harness.experience.snapshot().is_empty());
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() {
    let harness = TestHarness::new();
    let (orchestrator, _rx) = harness.create_orchestrator();

    assert!(!orchestrator.stop().await);
    assert!(!orchestrator.stop().await);
    assert_eq!(orchestrator.state(), OrchestratorState::Idle);
}

#[tokio::test]
async fn test_submission_while_busy_is_rejected() {
    let harness = TestHarness::new();
    harness.media.set_delay(Duration::from_secs(30)).await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    let second = orchestrator
        .submit(TaskDescriptor::download(harness.download_tasks(1)))
        .await;
    assert!(matches!(
        second,
        Err(OrchestratorError::Busy {
            state: OrchestratorState::RunningSniff
        })
    ));
    assert_eq!(orchestrator.current_task().as_deref(), Some(task_id.as_str()));

    orchestrator.stop().await;
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::Warning { .. })));
    assert_eq!(harness.downloader.download_count().await, 0);
}

#[tokio::test]
async fn test_next_task_accepted_after_completion_event() {
    let harness = TestHarness::new();
    harness
        .html
        .set_default_resolution(fixtures::resolution("Page", 1))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let first = orchestrator.submit(TaskDescriptor::sniff(ARTICLE)).await.unwrap();
    collect_until_completion(&mut rx, &first, Duration::from_secs(5)).await;

    let second = orchestrator
        .submit(TaskDescriptor::sniff(ARTICLE))
        .await
        .expect("orchestrator should accept a task once the previous one completed");
    assert_ne!(first, second);
    collect_until_completion(&mut rx, &second, Duration::from_secs(5)).await;
}

// =============================================================================
// Download Queue Tests
// =============================================================================

#[tokio::test]
async fn test_download_queue_runs_items_in_order() {
    let harness = TestHarness::new();
    harness.downloader.set_progress_steps(vec![10, 60, 40, 90]).await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator
        .submit(TaskDescriptor::download(harness.download_tasks(2)))
        .await
        .unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    let finished: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::DownloadFinished { index, outcome, .. } => {
                assert!(matches!(outcome, DownloadOutcome::Completed { .. }));
                Some(*index)
            }
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![0, 1]);

    // progress never goes backwards within an item
    let first_item: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::Progress { index: 0, percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(first_item, vec![10, 60, 90, 100]);

    match events.last() {
        Some(OrchestratorEvent::QueueFinished { summary, .. }) => {
            assert_eq!(summary.completed, 2);
            assert_eq!(summary.total(), 2);
        }
        other => panic!("expected QueueFinished, got {:?}", other),
    }
    let started = harness.downloader.started_tasks().await;
    assert_eq!(started[0].item.filename.as_deref(), Some("part-1.zip"));
    assert_eq!(started[1].item.filename.as_deref(), Some("part-2.zip"));
}

#[tokio::test]
async fn test_failed_item_does_not_stop_queue() {
    let harness = TestHarness::new();
    harness
        .downloader
        .set_next_error(DownloadError::http("HTTP 500 for part-1.zip"))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let mut tasks = harness.download_tasks(2);
    tasks.push(fixtures::download_task(
        fixtures::media_item("https://video.example.com/v/1", "137+140"),
        Path::new("/tmp/linkscout-test"),
    ));
    let task_id = orchestrator.submit(TaskDescriptor::download(tasks)).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    match events.last() {
        Some(OrchestratorEvent::QueueFinished { summary, .. }) => {
            // the media item has no executor registered
            assert_eq!(summary.completed, 1);
            assert_eq!(summary.failed, 2);
        }
        other => panic!("expected QueueFinished, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_clears_download_queue() {
    let harness = TestHarness::new();
    harness.downloader.set_progress_steps(vec![5, 10, 15, 20]).await;
    harness
        .downloader
        .set_step_delay(Duration::from_millis(200))
        .await;
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator
        .submit(TaskDescriptor::download(harness.download_tasks(3)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orchestrator.state(), OrchestratorState::RunningDownload);
    orchestrator.stop().await;

    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;
    let outcomes: Vec<&DownloadOutcome> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::DownloadFinished { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes, vec![&DownloadOutcome::Cancelled]);

    match events.last() {
        Some(OrchestratorEvent::QueueFinished { summary, .. }) => {
            assert_eq!(summary.cancelled, 1);
            assert_eq!(summary.skipped, 2);
            assert_eq!(summary.completed, 0);
        }
        other => panic!("expected QueueFinished, got {:?}", other),
    }
    assert_eq!(harness.downloader.download_count().await, 1);
}

#[tokio::test]
async fn test_empty_download_queue_is_rejected() {
    let harness = TestHarness::new();
    let (orchestrator, _rx) = harness.create_orchestrator();

    let result = orchestrator.submit(TaskDescriptor::download(Vec::new())).await;
    assert!(matches!(result, Err(OrchestratorError::InvalidTask(_))));
    assert_eq!(orchestrator.state(), OrchestratorState::Idle);
}

#[tokio::test]
async fn test_events_serialize_for_consumers() {
    let harness = TestHarness::new();
    let (orchestrator, mut rx) = harness.create_orchestrator();

    let task_id = orchestrator.submit(TaskDescriptor::sniff("not a url")).await.unwrap();
    let events = collect_until_completion(&mut rx, &task_id, Duration::from_secs(5)).await;

    let json = serde_json::to_value(events.last().unwrap()).unwrap();
    assert_eq!(json["event"], "sniff_finished");
    assert_eq!(json["task_id"], task_id.as_str());
}
