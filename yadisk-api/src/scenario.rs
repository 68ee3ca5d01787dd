//! Adaptive verification scenarios.
//!
//! Each scenario is a fixed linear script over [`YadiskClient`] calls. After
//! every call the status is classified with [`Outcome`] and the scenario
//! either continues, degrades to a partial result, or stops. A token without
//! the scopes for a call ends the scenario as [`Verdict::Skipped`]; only a
//! response that contradicts the API contract yields [`Verdict::Failed`].

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use reqwest::StatusCode;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::client::{YadiskClient, YadiskError};
use crate::outcome::{NextAction, Outcome};
use crate::response::{ApiResponse, DiskInfo, Resource, ResourceType};

const LIFECYCLE_FOLDER: &str = "test_folder_api";
const UPLOAD_FILE: &str = "test_file.txt";
const PUBLISH_FOLDER: &str = "test_publish_folder";
const WORKFLOW_FOLDER: &str = "workflow_test_folder";
const WORKFLOW_FILE: &str = "workflow_file.txt";
const DEFAULT_PAYLOAD: &[u8] = b"Test content for Yandex Disk API";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    DiskInfo,
    FolderLifecycle,
    FileUpload,
    Publish,
    CompleteWorkflow,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::DiskInfo,
        ScenarioKind::FolderLifecycle,
        ScenarioKind::FileUpload,
        ScenarioKind::Publish,
        ScenarioKind::CompleteWorkflow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::DiskInfo => "disk-info",
            ScenarioKind::FolderLifecycle => "folder-lifecycle",
            ScenarioKind::FileUpload => "file-upload",
            ScenarioKind::Publish => "publish",
            ScenarioKind::CompleteWorkflow => "complete-workflow",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ScenarioKind::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| {
                let known: Vec<_> = ScenarioKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown scenario {value:?}, expected one of: {}", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    DiskInfo,
    CreateFolder,
    Upload,
    Inspect,
    Publish,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub status: u16,
    pub outcome: Outcome,
    pub action: NextAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Verdict {
    Passed,
    /// Ran to the end, but at least one step did not fully succeed.
    Partial { step: Step, outcome: Outcome },
    /// The token is not allowed to do what the scenario needs.
    Skipped { step: Step, outcome: Outcome },
    Aborted { step: Step, outcome: Outcome },
    Failed { step: Step, reason: String },
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    pub verdict: Verdict,
    pub steps: Vec<StepRecord>,
}

impl ScenarioReport {
    pub fn calls(&self, step: Step) -> usize {
        self.steps.iter().filter(|record| record.step == step).count()
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    /// Remote folder the scenarios work under; empty means the disk root.
    pub root: String,
    pub payload: Vec<u8>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            root: String::new(),
            payload: DEFAULT_PAYLOAD.to_vec(),
        }
    }
}

impl ScenarioSettings {
    fn remote(&self, name: &str) -> String {
        let root = self.root.trim_end_matches('/');
        if root.is_empty() {
            name.to_string()
        } else {
            format!("{root}/{name}")
        }
    }
}

pub struct ScenarioRunner<'a> {
    client: &'a YadiskClient,
    settings: ScenarioSettings,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(client: &'a YadiskClient) -> Self {
        Self::with_settings(client, ScenarioSettings::default())
    }

    pub fn with_settings(client: &'a YadiskClient, settings: ScenarioSettings) -> Self {
        Self { client, settings }
    }

    /// Runs one scenario. Only transport and local I/O failures are errors;
    /// every HTTP status ends up in the report.
    pub async fn run(&self, kind: ScenarioKind) -> Result<ScenarioReport, YadiskError> {
        let mut tracker = Tracker::default();
        let verdict = match kind {
            ScenarioKind::DiskInfo => self.disk_info(&mut tracker).await?,
            ScenarioKind::FolderLifecycle => self.folder_lifecycle(&mut tracker).await?,
            ScenarioKind::FileUpload => self.file_upload(&mut tracker).await?,
            ScenarioKind::Publish => self.publish(&mut tracker).await?,
            ScenarioKind::CompleteWorkflow => self.complete_workflow(&mut tracker).await?,
        };
        Ok(tracker.finish(kind, verdict))
    }

    async fn disk_info(&self, tracker: &mut Tracker) -> Result<Verdict, YadiskError> {
        let response = self.client.get_disk_info().await?;
        let outcome = tracker.record(Step::DiskInfo, None, &response);
        if !outcome.is_success() {
            return Ok(unusable_info(outcome));
        }
        match response.json::<DiskInfo>() {
            Ok(info) => info!(
                total_space = info.total_space,
                used_space = info.used_space,
                "disk info available"
            ),
            Err(err) => {
                return Ok(Verdict::Failed {
                    step: Step::DiskInfo,
                    reason: err.to_string(),
                });
            }
        }
        Ok(tracker.settle())
    }

    async fn folder_lifecycle(&self, tracker: &mut Tracker) -> Result<Verdict, YadiskError> {
        if let Some(verdict) = self.precheck(tracker).await? {
            return Ok(verdict);
        }
        let folder = self.settings.remote(LIFECYCLE_FOLDER);
        let response = self.client.create_folder(&folder).await?;
        let outcome = tracker.record(Step::CreateFolder, Some(&folder), &response);
        if let Some(verdict) = halting_verdict(Step::CreateFolder, outcome) {
            return Ok(verdict);
        }
        // A conflict means the folder predates this run; leave it alone.
        if outcome.is_success() {
            self.delete(tracker, &folder).await?;
        }
        Ok(tracker.settle())
    }

    async fn file_upload(&self, tracker: &mut Tracker) -> Result<Verdict, YadiskError> {
        if let Some(verdict) = self.precheck(tracker).await? {
            return Ok(verdict);
        }
        let scratch = self.scratch_file()?;
        let remote = self.settings.remote(UPLOAD_FILE);
        let response = self
            .client
            .upload_file(scratch.path(), &remote, false)
            .await?;
        let outcome = tracker.record(Step::Upload, Some(&remote), &response);
        if let Some(verdict) = halting_verdict(Step::Upload, outcome) {
            return Ok(verdict);
        }
        if outcome.is_success() {
            self.delete(tracker, &remote).await?;
        }
        Ok(tracker.settle())
    }

    async fn publish(&self, tracker: &mut Tracker) -> Result<Verdict, YadiskError> {
        if let Some(verdict) = self.precheck(tracker).await? {
            return Ok(verdict);
        }
        let folder = self.settings.remote(PUBLISH_FOLDER);
        let response = self.client.create_folder(&folder).await?;
        let created = tracker.record(Step::CreateFolder, Some(&folder), &response);
        if let Some(verdict) = halting_verdict(Step::CreateFolder, created) {
            return Ok(verdict);
        }

        let halted = self.publish_step(tracker, &folder).await;
        let cleanup = if created.is_satisfied() {
            self.delete(tracker, &folder).await
        } else {
            Ok(())
        };
        let halted = halted?;
        cleanup?;
        Ok(halted.unwrap_or_else(|| tracker.settle()))
    }

    async fn publish_step(
        &self,
        tracker: &mut Tracker,
        folder: &str,
    ) -> Result<Option<Verdict>, YadiskError> {
        let response = self.client.publish_resource(folder).await?;
        let outcome = tracker.record(Step::Publish, Some(folder), &response);
        if let Some(verdict) = halting_verdict(Step::Publish, outcome) {
            return Ok(Some(verdict));
        }
        // Only 200 means the resource is public now. Anything else the
        // server tolerated is reported, not counted as success.
        if response.status() != StatusCode::OK {
            tracker.degrade(Step::Publish, outcome);
        }
        Ok(None)
    }

    async fn complete_workflow(&self, tracker: &mut Tracker) -> Result<Verdict, YadiskError> {
        if let Some(verdict) = self.precheck(tracker).await? {
            return Ok(verdict);
        }
        let folder = self.settings.remote(WORKFLOW_FOLDER);
        let file = format!("{folder}/{WORKFLOW_FILE}");

        let response = self.client.create_folder(&folder).await?;
        let created = tracker.record(Step::CreateFolder, Some(&folder), &response);
        if let Some(verdict) = halting_verdict(Step::CreateFolder, created) {
            return Ok(verdict);
        }

        let halted = self.workflow_steps(tracker, &folder, &file).await;
        let cleanup = if created.is_satisfied() {
            self.delete(tracker, &folder).await
        } else {
            Ok(())
        };
        let halted = halted?;
        cleanup?;
        Ok(halted.unwrap_or_else(|| tracker.settle()))
    }

    async fn workflow_steps(
        &self,
        tracker: &mut Tracker,
        folder: &str,
        file: &str,
    ) -> Result<Option<Verdict>, YadiskError> {
        let scratch = self.scratch_file()?;
        let response = self.client.upload_file(scratch.path(), file, false).await?;
        let outcome = tracker.record(Step::Upload, Some(file), &response);
        if let Some(verdict) = halting_verdict(Step::Upload, outcome) {
            return Ok(Some(verdict));
        }
        drop(scratch);

        let response = self.client.get_resource_info(folder).await?;
        let outcome = tracker.record(Step::Inspect, Some(folder), &response);
        if let Some(verdict) = halting_verdict(Step::Inspect, outcome) {
            return Ok(Some(verdict));
        }
        if outcome.is_success() {
            let reason = match response.json::<Resource>() {
                Ok(resource) if resource.resource_type == ResourceType::Dir => None,
                Ok(resource) => Some(format!("{} is not a directory", resource.path)),
                Err(err) => Some(err.to_string()),
            };
            if let Some(reason) = reason {
                return Ok(Some(Verdict::Failed {
                    step: Step::Inspect,
                    reason,
                }));
            }
        }
        Ok(None)
    }

    /// Confirms the token can read the disk before anything is created.
    async fn precheck(&self, tracker: &mut Tracker) -> Result<Option<Verdict>, YadiskError> {
        let response = self.client.get_disk_info().await?;
        let outcome = tracker.record(Step::DiskInfo, None, &response);
        if outcome.is_success() {
            return Ok(None);
        }
        Ok(Some(unusable_info(outcome)))
    }

    async fn delete(&self, tracker: &mut Tracker, path: &str) -> Result<(), YadiskError> {
        let response = self.client.delete_resource(path, false).await?;
        let outcome = tracker.record(Step::Delete, Some(path), &response);
        if !outcome.is_success() {
            tracker.degrade(Step::Delete, outcome);
        }
        Ok(())
    }

    fn scratch_file(&self) -> Result<NamedTempFile, YadiskError> {
        let mut file = tempfile::Builder::new()
            .prefix("yadisk-probe-")
            .suffix(".txt")
            .tempfile()
            .map_err(|source| YadiskError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let path = file.path().to_path_buf();
        file.write_all(&self.settings.payload)
            .and_then(|()| file.flush())
            .map_err(|source| YadiskError::Io { path, source })?;
        Ok(file)
    }
}

/// Any info status other than success means the disk cannot be inspected.
fn unusable_info(outcome: Outcome) -> Verdict {
    halting_verdict(Step::DiskInfo, outcome).unwrap_or(Verdict::Skipped {
        step: Step::DiskInfo,
        outcome,
    })
}

fn halting_verdict(step: Step, outcome: Outcome) -> Option<Verdict> {
    match outcome.action() {
        NextAction::SkipScenario => Some(Verdict::Skipped { step, outcome }),
        NextAction::AbortDependents | NextAction::AbortScenario => {
            Some(Verdict::Aborted { step, outcome })
        }
        NextAction::Proceed | NextAction::AbortStep | NextAction::ContinueCautiously => None,
    }
}

#[derive(Default)]
struct Tracker {
    steps: Vec<StepRecord>,
    degraded: Option<(Step, Outcome)>,
}

impl Tracker {
    fn record(&mut self, step: Step, path: Option<&str>, response: &ApiResponse) -> Outcome {
        let outcome = response.outcome();
        let action = outcome.action();
        if matches!(
            action,
            NextAction::AbortStep | NextAction::ContinueCautiously
        ) {
            self.degrade(step, outcome);
        }
        self.steps.push(StepRecord {
            step,
            path: path.map(str::to_string),
            status: response.status().as_u16(),
            outcome,
            action,
        });
        outcome
    }

    /// Keeps the first degradation; later ones do not change the verdict.
    fn degrade(&mut self, step: Step, outcome: Outcome) {
        if self.degraded.is_none() {
            self.degraded = Some((step, outcome));
        }
    }

    fn settle(&self) -> Verdict {
        match self.degraded {
            Some((step, outcome)) => Verdict::Partial { step, outcome },
            None => Verdict::Passed,
        }
    }

    fn finish(self, scenario: ScenarioKind, verdict: Verdict) -> ScenarioReport {
        let name = scenario.name();
        match &verdict {
            Verdict::Passed => info!(scenario = name, "scenario passed"),
            Verdict::Partial { step, outcome } => {
                warn!(scenario = name, ?step, ?outcome, "scenario finished partially")
            }
            Verdict::Skipped { step, outcome } => {
                info!(scenario = name, ?step, ?outcome, "scenario skipped")
            }
            Verdict::Aborted { step, outcome } => {
                warn!(scenario = name, ?step, ?outcome, "scenario aborted")
            }
            Verdict::Failed { step, reason } => {
                error!(scenario = name, ?step, reason = %reason, "scenario failed")
            }
        }
        ScenarioReport {
            scenario,
            verdict,
            steps: self.steps,
        }
    }
}
