use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::DataUri;

/// Progress message while the subject is being isolated
pub const ISOLATING_MESSAGE: &str = "Isolating subject...";

/// Progress message while the portrait is being stylized
pub const STYLIZING_MESSAGE: &str = "Creating your pixel portrait...";

/// Pipeline stage. Idle is both the start and the terminal stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Idle,
    Isolating,
    Stylizing,
}

/// Outcome of a run as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Nothing submitted yet (or reset)
    Empty,
    Processing,
    Succeeded,
    Failed,
}

/// One attempt to turn a source photo into a pixel art portrait.
///
/// Only the pipeline controller mutates a run; everyone else reads
/// [`RunSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub run_id: u64,
    pub source_image: Option<DataUri>,
    pub isolated_image: Option<DataUri>,
    pub final_image: Option<DataUri>,
    pub stage: Stage,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Fresh idle run with nothing in it
    pub fn idle(run_id: u64) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    /// New run for a submitted photo, already isolating
    pub fn start(run_id: u64, source: DataUri) -> Self {
        Self {
            run_id,
            source_image: Some(source),
            stage: Stage::Isolating,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// A run is in flight while either remote call is outstanding
    pub fn is_processing(&self) -> bool {
        self.stage != Stage::Idle
    }

    /// Isolation produced an image; move on to stylizing.
    pub fn record_isolated(&mut self, image: DataUri) {
        debug_assert_eq!(self.stage, Stage::Isolating);
        self.isolated_image = Some(image);
        self.stage = Stage::Stylizing;
    }

    /// Stylizing produced the final portrait.
    pub fn record_final(&mut self, image: DataUri) {
        debug_assert_eq!(self.stage, Stage::Stylizing);
        self.final_image = Some(image);
        self.stage = Stage::Idle;
        self.finished_at = Some(Utc::now());
    }

    /// Either stage failed. Intermediate results are kept.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.stage = Stage::Idle;
        self.finished_at = Some(Utc::now());
    }

    pub fn status(&self) -> RunStatus {
        match (self.stage, &self.final_image, &self.last_error) {
            (Stage::Isolating | Stage::Stylizing, _, _) => RunStatus::Processing,
            (Stage::Idle, _, Some(_)) => RunStatus::Failed,
            (Stage::Idle, Some(_), None) => RunStatus::Succeeded,
            (Stage::Idle, None, None) => RunStatus::Empty,
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let status = self.status();
        let (progress, message) = match (self.stage, status) {
            (Stage::Isolating, _) => (33, Some(ISOLATING_MESSAGE)),
            (Stage::Stylizing, _) => (66, Some(STYLIZING_MESSAGE)),
            (Stage::Idle, RunStatus::Succeeded) => (100, None),
            _ => (0, None),
        };

        RunSnapshot {
            run_id: self.run_id,
            stage: self.stage,
            status,
            progress,
            message: message.map(str::to_string),
            error: self.last_error.clone(),
            has_source: self.source_image.is_some(),
            has_isolated: self.isolated_image.is_some(),
            has_final: self.final_image.is_some(),
            isolated_image: self.isolated_image.as_ref().map(ToString::to_string),
            final_image: self.final_image.as_ref().map(ToString::to_string),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Read-only view of a run, serialized for the UI
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RunSnapshot {
    /// Identifier of the run (increments on every submit and reset)
    pub run_id: u64,
    pub stage: Stage,
    pub status: RunStatus,
    /// Progress percentage for the progress bar
    pub progress: u8,
    /// Progress text while processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// User-facing error after a failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_source: bool,
    /// Whether the first stage has produced a cut-out
    pub has_isolated: bool,
    pub has_final: bool,
    /// Subject isolated by the first stage, as a data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolated_image: Option<String>,
    /// Finished portrait, as a data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
