//! In-memory fakes shared by the unit test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::config::ConnectionSettings;
use crate::error::{PipelensError, Result};
use crate::hub::{Connection, HubUpdate, PushHub, Target};
use crate::providers::types::{
    Build, BuildId, BuildResult, BuildStatus, DefinitionId, LogReference, PipelineDefinition,
    PipelineDefinitionRef, Project, RecordType, TimelineRecord, TimelineState, VariableGroup,
};
use crate::providers::{ClientFactory, DevOpsApi};

#[derive(Default)]
pub struct FakeState {
    pub project: Project,
    pub definitions: Vec<PipelineDefinitionRef>,
    pub full_definitions: HashMap<DefinitionId, PipelineDefinition>,
    pub builds: HashMap<DefinitionId, Vec<Build>>,
    pub timelines: HashMap<BuildId, Vec<TimelineRecord>>,
    pub logs: HashMap<(BuildId, u32), Vec<String>>,
    pub variable_groups: Vec<VariableGroup>,
    /// Keyed by file path.
    pub files: HashMap<String, String>,
    pub failing_builds: HashSet<DefinitionId>,
    pub failing_timelines: HashSet<BuildId>,
    pub failing_logs: HashSet<(BuildId, u32)>,
    pub fail_definitions: bool,
    pub fail_variable_groups: bool,
    pub fail_project: bool,
}

fn server_error() -> PipelensError {
    PipelensError::ApiError {
        status: 500,
        message: "fake failure".to_string(),
    }
}

/// Scripted [`DevOpsApi`] that counts calls and the peak number of calls in
/// flight at once.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        guard
    }

    fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

#[async_trait]
impl DevOpsApi for FakeApi {
    fn organization(&self) -> &str {
        "contoso"
    }

    async fn project(&self) -> Result<Project> {
        let _guard = self.enter().await;
        self.read(|s| {
            if s.fail_project {
                Err(PipelensError::ProjectNotFound("web".to_string()))
            } else {
                Ok(s.project.clone())
            }
        })
    }

    async fn definitions(&self) -> Result<Vec<PipelineDefinitionRef>> {
        let _guard = self.enter().await;
        self.read(|s| {
            if s.fail_definitions {
                Err(server_error())
            } else {
                Ok(s.definitions.clone())
            }
        })
    }

    async fn definition(&self, id: DefinitionId) -> Result<PipelineDefinition> {
        let _guard = self.enter().await;
        self.read(|s| {
            s.full_definitions
                .get(&id)
                .cloned()
                .ok_or(PipelensError::DefinitionNotFound(id))
        })
    }

    async fn latest_build(&self, definition_id: DefinitionId) -> Result<Option<Build>> {
        Ok(self.builds(definition_id, 1).await?.into_iter().next())
    }

    async fn builds(&self, definition_id: DefinitionId, top: usize) -> Result<Vec<Build>> {
        let _guard = self.enter().await;
        self.read(|s| {
            if s.failing_builds.contains(&definition_id) {
                return Err(server_error());
            }
            Ok(s.builds
                .get(&definition_id)
                .map(|b| b.iter().take(top).cloned().collect())
                .unwrap_or_default())
        })
    }

    async fn build(&self, build_id: BuildId) -> Result<Build> {
        let _guard = self.enter().await;
        self.read(|s| {
            s.builds
                .values()
                .flatten()
                .find(|b| b.id == build_id)
                .cloned()
                .ok_or(PipelensError::BuildNotFound(build_id))
        })
    }

    async fn timeline(&self, build_id: BuildId) -> Result<Vec<TimelineRecord>> {
        let _guard = self.enter().await;
        self.read(|s| {
            if s.failing_timelines.contains(&build_id) {
                return Err(server_error());
            }
            Ok(s.timelines.get(&build_id).cloned().unwrap_or_default())
        })
    }

    async fn log_lines(&self, build_id: BuildId, log_id: u32) -> Result<Vec<String>> {
        let _guard = self.enter().await;
        self.read(|s| {
            if s.failing_logs.contains(&(build_id, log_id)) {
                return Err(server_error());
            }
            Ok(s.logs.get(&(build_id, log_id)).cloned().unwrap_or_default())
        })
    }

    async fn variable_groups(&self) -> Result<Vec<VariableGroup>> {
        let _guard = self.enter().await;
        self.read(|s| {
            if s.fail_variable_groups {
                Err(server_error())
            } else {
                Ok(s.variable_groups.clone())
            }
        })
    }

    async fn file_content(
        &self,
        _repository_id: &str,
        path: &str,
        _branch: &str,
    ) -> Result<Option<String>> {
        let _guard = self.enter().await;
        self.read(|s| Ok(s.files.get(path).cloned()))
    }
}

pub struct FakeFactory(pub Arc<FakeApi>);

impl ClientFactory for FakeFactory {
    fn connect(&self, _settings: &ConnectionSettings) -> Result<Arc<dyn DevOpsApi>> {
        Ok(self.0.clone())
    }
}

/// [`PushHub`] with a fixed connection list that records every send.
#[derive(Default)]
pub struct RecordingHub {
    connections: Mutex<Vec<Connection>>,
    sent: Mutex<Vec<(Target, HubUpdate)>>,
    fail_sends: AtomicBool,
}

impl RecordingHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, id: &str, group: &str) {
        self.connections.lock().unwrap().push(Connection {
            id: id.to_string(),
            groups: vec![group.to_string()],
        });
    }

    pub fn leave_all(&self) {
        self.connections.lock().unwrap().clear();
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Target, HubUpdate)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushHub for RecordingHub {
    async fn active_connections(&self) -> Vec<Connection> {
        self.connections.lock().unwrap().clone()
    }

    async fn send(&self, target: Target, update: HubUpdate) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PipelensError::Hub("transport down".to_string()));
        }
        self.sent.lock().unwrap().push((target, update));
        Ok(())
    }
}

pub fn settings() -> ConnectionSettings {
    ConnectionSettings {
        token: "pat".into(),
        organization: "contoso".to_string(),
        project: "web".to_string(),
    }
}

pub fn definition_ref(id: DefinitionId, name: &str) -> PipelineDefinitionRef {
    PipelineDefinitionRef {
        id,
        name: name.to_string(),
        path: "\\".to_string(),
        ..PipelineDefinitionRef::default()
    }
}

pub fn build(id: BuildId, status: BuildStatus, result: Option<BuildResult>) -> Build {
    Build {
        id,
        build_number: Some(format!("2024.{id}")),
        status,
        result,
        ..Build::default()
    }
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

pub fn record(
    id: &str,
    parent_id: Option<&str>,
    record_type: RecordType,
    order: i32,
    state: TimelineState,
) -> TimelineRecord {
    TimelineRecord {
        id: id.to_string(),
        parent_id: parent_id.map(str::to_string),
        record_type,
        name: Some(id.to_string()),
        order: Some(order),
        state: Some(state),
        result: None,
        start_time: None,
        finish_time: None,
        log: None,
    }
}

pub fn with_log(mut record: TimelineRecord, log_id: u32) -> TimelineRecord {
    record.log = Some(LogReference {
        id: Some(log_id),
        url: Some(format!("https://logs/{log_id}")),
    });
    record
}
