use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{ConnectionProvider, MonitorConfig};
use crate::error::{PipelensError, Result};
use crate::hub::{subscriber_count, HubPayload, HubUpdate, PushHub, Target, UpdateType, MONITOR_GROUP};
use crate::providers::types::PipelineDefinitionRef;
use crate::providers::{ClientFactory, DevOpsApi};

use super::backoff::Backoff;
use super::cache::StatusCache;
use super::snapshot::{capture, PipelineStatusSnapshot};

/// Heartbeat published to the monitor group once per completed poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineLiveUpdate {
    pub changed_pipelines: Vec<PipelineStatusSnapshot>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub pipelines_checked: usize,
    pub running_count: usize,
}

impl PipelineLiveUpdate {
    fn summary(changed: usize, checked: usize) -> String {
        if changed > 0 {
            format!("{changed} pipeline(s) updated")
        } else {
            format!("Checked {checked} pipelines — no changes")
        }
    }
}

/// What a single poll cycle did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Nobody is watching; no API call was made.
    Idle,
    /// Token, organization or project is missing.
    NotConfigured,
    Published(PipelineLiveUpdate),
}

struct Polled {
    snapshot: PipelineStatusSnapshot,
    changed: bool,
}

/// Background poller that streams pipeline status changes to the monitor
/// group.
pub struct PipelineMonitor {
    hub: Arc<dyn PushHub>,
    connections: Arc<dyn ConnectionProvider>,
    clients: Arc<dyn ClientFactory>,
    cache: Arc<dyn StatusCache>,
    config: MonitorConfig,
}

impl PipelineMonitor {
    pub fn new(
        hub: Arc<dyn PushHub>,
        connections: Arc<dyn ConnectionProvider>,
        clients: Arc<dyn ClientFactory>,
        cache: Arc<dyn StatusCache>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            hub,
            connections,
            clients,
            cache,
            config,
        }
    }

    /// Polls until `shutdown` is cancelled.
    ///
    /// Cycle failures are logged and stretch the next delay; they never end
    /// the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Pipeline monitor starting (warm-up {:?}, interval {:?})",
            self.config.warmup(),
            self.config.poll_interval()
        );

        if !sleep_or_cancel(self.config.warmup(), &shutdown).await {
            info!("Pipeline monitor stopped before first poll");
            return;
        }

        let mut backoff = Backoff::new(self.config.poll_interval(), self.config.max_backoff_multiplier);

        loop {
            match self.run_cycle(&shutdown).await {
                Ok(CycleOutcome::Idle) => debug!("No monitor subscribers, skipping poll"),
                Ok(CycleOutcome::NotConfigured) => {
                    debug!("DevOps connection not configured, skipping poll");
                    backoff.record_success();
                }
                Ok(CycleOutcome::Published(update)) => {
                    debug!("{}", update.message);
                    backoff.record_success();
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    backoff.record_failure();
                    warn!(
                        "Pipeline poll failed ({} consecutive): {e}",
                        backoff.consecutive_errors()
                    );
                }
            }

            if !sleep_or_cancel(backoff.delay(), &shutdown).await {
                break;
            }
        }

        info!("Pipeline monitor stopped");
    }

    /// Runs one poll cycle.
    ///
    /// # Errors
    ///
    /// Returns [`PipelensError::Cancelled`] when `shutdown` fires mid-cycle,
    /// or the error that prevented the definitions list from being fetched
    /// or the heartbeat from being sent.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<CycleOutcome> {
        if subscriber_count(self.hub.as_ref(), MONITOR_GROUP).await == 0 {
            return Ok(CycleOutcome::Idle);
        }

        let Some(settings) = self.connections.connection() else {
            return Ok(CycleOutcome::NotConfigured);
        };

        let api = self.clients.connect(&settings)?;
        let definitions = tokio::select! {
            _ = shutdown.cancelled() => return Err(PipelensError::Cancelled),
            definitions = api.definitions() => definitions?,
        };

        let seeded = self.cache.is_seeded();
        let semaphore = Semaphore::new(self.config.max_concurrent_requests.max(1));

        let polls = definitions
            .iter()
            .map(|definition| self.poll_pipeline(api.as_ref(), definition, &semaphore, shutdown, seeded));
        let polled: Vec<Polled> = join_all(polls).await.into_iter().flatten().collect();

        if shutdown.is_cancelled() {
            return Err(PipelensError::Cancelled);
        }

        self.cache.mark_seeded();

        let pipelines_checked = polled.len();
        let running_count = polled.iter().filter(|p| p.snapshot.is_running()).count();
        let changed_pipelines: Vec<PipelineStatusSnapshot> = polled
            .into_iter()
            .filter(|p| p.changed)
            .map(|p| p.snapshot)
            .collect();

        let update = PipelineLiveUpdate {
            message: PipelineLiveUpdate::summary(changed_pipelines.len(), pipelines_checked),
            changed_pipelines,
            timestamp: Utc::now(),
            pipelines_checked,
            running_count,
        };

        self.hub
            .send(
                Target::group(MONITOR_GROUP),
                HubUpdate::new(
                    UpdateType::PipelineLiveStatusUpdate,
                    update.message.clone(),
                    HubPayload::LiveStatus(update.clone()),
                ),
            )
            .await?;

        Ok(CycleOutcome::Published(update))
    }

    /// Captures one pipeline and records it in the cache. `None` when the
    /// capture failed or shutdown fired; the pipeline is retried next cycle.
    async fn poll_pipeline(
        &self,
        api: &dyn DevOpsApi,
        definition: &PipelineDefinitionRef,
        semaphore: &Semaphore,
        shutdown: &CancellationToken,
        seeded: bool,
    ) -> Option<Polled> {
        let gated = async {
            let _permit = semaphore.acquire().await.ok()?;
            Some(capture(api, definition).await)
        };

        let snapshot = tokio::select! {
            _ = shutdown.cancelled() => return None,
            captured = gated => captured?,
        };

        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Skipping pipeline {} this cycle: {e}", definition.name);
                return None;
            }
        };

        let previous = self.cache.insert(snapshot.clone());
        let changed = seeded
            && previous.map_or(true, |previous| previous.change_key() != snapshot.change_key());

        Some(Polled { snapshot, changed })
    }
}

/// `false` when cancelled before `delay` elapsed.
async fn sleep_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConnection;
    use crate::monitor::MemoryStatusCache;
    use crate::providers::types::{BuildResult, BuildStatus, RecordType, TimelineState};
    use crate::testing::{build, definition_ref, record, settings, FakeApi, FakeFactory, RecordingHub};

    struct Harness {
        api: Arc<FakeApi>,
        hub: Arc<RecordingHub>,
        cache: Arc<MemoryStatusCache>,
        monitor: PipelineMonitor,
    }

    fn harness_with(api: FakeApi, connection: Option<crate::config::ConnectionSettings>) -> Harness {
        let api = Arc::new(api);
        let hub = Arc::new(RecordingHub::new());
        let cache = Arc::new(MemoryStatusCache::new());
        let monitor = PipelineMonitor::new(
            hub.clone(),
            Arc::new(StaticConnection::new(connection)),
            Arc::new(FakeFactory(api.clone())),
            cache.clone(),
            MonitorConfig::default(),
        );
        Harness {
            api,
            hub,
            cache,
            monitor,
        }
    }

    fn harness(api: FakeApi) -> Harness {
        harness_with(api, Some(settings()))
    }

    fn two_pipelines() -> FakeApi {
        let api = FakeApi::new();
        api.update(|s| {
            s.definitions = vec![definition_ref(1, "api"), definition_ref(2, "web")];
            s.builds.insert(1, vec![build(10, BuildStatus::InProgress, None)]);
            s.builds.insert(
                2,
                vec![build(20, BuildStatus::Completed, Some(BuildResult::Succeeded))],
            );
            s.timelines.insert(
                10,
                vec![record("Build", None, RecordType::Stage, 1, TimelineState::InProgress)],
            );
        });
        api
    }

    async fn published(h: &Harness) -> PipelineLiveUpdate {
        match h.monitor.run_cycle(&CancellationToken::new()).await.unwrap() {
            CycleOutcome::Published(update) => update,
            other => panic!("expected a published cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_subscribers_means_no_api_calls() {
        let h = harness(two_pipelines());

        for _ in 0..3 {
            let outcome = h.monitor.run_cycle(&CancellationToken::new()).await.unwrap();
            assert!(matches!(outcome, CycleOutcome::Idle));
        }

        assert_eq!(h.api.calls(), 0);
        assert!(h.hub.sent().is_empty());
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_configuration_is_quiet() {
        let h = harness_with(two_pipelines(), None);
        h.hub.join("c1", MONITOR_GROUP);

        let outcome = h.monitor.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::NotConfigured));
        assert_eq!(h.api.calls(), 0);
        assert!(h.hub.sent().is_empty());
    }

    #[tokio::test]
    async fn test_first_poll_seeds_without_reporting_changes() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);

        let update = published(&h).await;
        assert!(update.changed_pipelines.is_empty());
        assert_eq!(update.pipelines_checked, 2);
        assert_eq!(update.running_count, 1);
        assert_eq!(update.message, "Checked 2 pipelines — no changes");
        assert!(h.cache.is_seeded());
        assert_eq!(h.cache.len(), 2);

        let sent = h.hub.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Target::group(MONITOR_GROUP));
        assert_eq!(sent[0].1.update_type, UpdateType::PipelineLiveStatusUpdate);
    }

    #[tokio::test]
    async fn test_unchanged_pipelines_still_get_a_heartbeat() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);

        published(&h).await;
        let update = published(&h).await;
        assert!(update.changed_pipelines.is_empty());
        assert_eq!(h.hub.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_new_build_is_reported() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);
        published(&h).await;

        h.api.update(|s| {
            s.builds.insert(
                2,
                vec![build(21, BuildStatus::Completed, Some(BuildResult::Succeeded))],
            );
        });

        let update = published(&h).await;
        assert_eq!(update.changed_pipelines.len(), 1);
        assert_eq!(update.changed_pipelines[0].id, 2);
        assert_eq!(update.changed_pipelines[0].last_run_build_id, Some(21));
        assert_eq!(update.message, "1 pipeline(s) updated");
        assert_eq!(h.cache.get(2).unwrap().last_run_build_id, Some(21));
    }

    #[tokio::test]
    async fn test_stage_progress_is_reported() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);
        published(&h).await;

        h.api.update(|s| {
            s.timelines.insert(
                10,
                vec![record("Build", None, RecordType::Stage, 1, TimelineState::Completed)],
            );
        });

        let update = published(&h).await;
        let ids: Vec<_> = update.changed_pipelines.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_pipeline_added_after_seeding_is_reported() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);
        published(&h).await;

        h.api.update(|s| s.definitions.push(definition_ref(3, "docs")));

        let update = published(&h).await;
        assert_eq!(update.pipelines_checked, 3);
        let ids: Vec<_> = update.changed_pipelines.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3]);
        assert!(update.changed_pipelines[0].last_run_status.is_none());
    }

    #[tokio::test]
    async fn test_failing_pipeline_is_omitted() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);
        h.api.update(|s| {
            s.failing_builds.insert(1);
            s.failing_timelines.insert(20);
        });

        let update = published(&h).await;
        assert_eq!(update.pipelines_checked, 1);
        assert!(h.cache.get(1).is_none());
        assert!(h.cache.get(2).unwrap().stages.is_empty());
    }

    #[tokio::test]
    async fn test_definition_failure_fails_the_cycle() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);
        h.api.update(|s| s.fail_definitions = true);

        let result = h.monitor.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(result, Err(PipelensError::ApiError { status: 500, .. })));
        assert!(!h.cache.is_seeded());
        assert!(h.hub.sent().is_empty());
    }

    #[tokio::test]
    async fn test_at_most_five_fetches_in_flight() {
        let api = FakeApi::new().with_latency(Duration::from_millis(20));
        api.update(|s| {
            s.definitions = (1..=20).map(|id| definition_ref(id, &format!("p{id}"))).collect();
        });
        let h = harness(api);
        h.hub.join("c1", MONITOR_GROUP);

        let update = published(&h).await;
        assert_eq!(update.pipelines_checked, 20);
        assert!(h.api.max_in_flight() <= 5, "peak {}", h.api.max_in_flight());
        assert!(h.api.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_publishes_nothing() {
        let api = FakeApi::new().with_latency(Duration::from_secs(30));
        api.update(|s| s.definitions = vec![definition_ref(1, "api")]);
        let h = harness(api);
        h.hub.join("c1", MONITOR_GROUP);

        let shutdown = CancellationToken::new();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), h.monitor.run_cycle(&shutdown))
            .await
            .expect("cycle should observe cancellation");
        assert!(matches!(result, Err(PipelensError::Cancelled)));
        assert!(h.hub.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel_during_warmup() {
        let h = harness(two_pipelines());
        h.hub.join("c1", MONITOR_GROUP);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        h.monitor.run(shutdown).await;

        assert_eq!(h.api.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_after_warmup_until_cancelled() {
        let h = Arc::new(harness(two_pipelines()));
        h.hub.join("c1", MONITOR_GROUP);

        let shutdown = CancellationToken::new();
        let runner = {
            let h = h.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { h.monitor.run(shutdown).await })
        };

        // Warm-up is 10 s and the interval 5 s: polls at 10, 15 and 20 s.
        tokio::time::sleep(Duration::from_secs(22)).await;
        shutdown.cancel();
        runner.await.unwrap();

        assert_eq!(h.hub.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failures_back_off() {
        let h = Arc::new(harness(two_pipelines()));
        h.hub.join("c1", MONITOR_GROUP);
        h.hub.fail_sends(true);

        let shutdown = CancellationToken::new();
        let runner = {
            let h = h.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { h.monitor.run(shutdown).await })
        };

        // Failed polls at 10 s, 20 s and 35 s; the next one is due at 55 s.
        tokio::time::sleep(Duration::from_secs(36)).await;
        let calls_while_failing = h.api.calls();
        h.hub.fail_sends(false);
        tokio::time::sleep(Duration::from_secs(20)).await;
        shutdown.cancel();
        runner.await.unwrap();

        // definitions + 2 latest builds + 2 timelines per cycle
        assert_eq!(calls_while_failing, 15);
        assert_eq!(h.hub.sent().len(), 1);
    }
}
