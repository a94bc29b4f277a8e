//! Pipeline state machine for one session.
//!
//! `submit` starts a run and spawns a driver task that awaits the isolate
//! call, records its result, then awaits the stylize call. Every result is
//! applied under the run lock and only if the run it belongs to is still
//! current, which is how `reset` abandons a run mid-flight.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::error::TransformError;
use crate::models::{ApiKey, DataUri, PipelineRun, RunSnapshot};
use crate::services::transform_client::{TransformClient, TransformStage};

/// Shown when the isolate stage fails
pub const ISOLATE_FAILED_MESSAGE: &str =
    "We could not process this image. Please try another photo with a clear subject.";

/// Shown when the stylize stage fails
pub const STYLIZE_FAILED_MESSAGE: &str =
    "The pixel art generation failed. This can happen sometimes. Please try again.";

/// Shown when no API key is available
pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "A Google AI API key is required. Add one and try again.";

/// Snapshot events buffered per subscriber
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Run {run_id} is still in progress")]
    Busy { run_id: u64 },
}

/// How a run ended, as seen by whoever awaits its [`RunHandle`]
#[derive(Debug)]
pub enum RunOutcome {
    Completed(DataUri),
    Failed(TransformError),
    /// The run was reset or replaced before it finished
    Abandoned,
}

/// Handle to a submitted run's driver task
#[derive(Debug)]
pub struct RunHandle {
    run_id: u64,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Wait for the driver to finish
    pub async fn wait(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(run_id = self.run_id, error = %e, "Run driver task failed");
                RunOutcome::Abandoned
            }
        }
    }
}

/// User-facing text for a failed stage
pub fn user_message(error: &TransformError) -> &'static str {
    match error {
        TransformError::MissingCredential => MISSING_CREDENTIAL_MESSAGE,
        TransformError::ProcessingFailure {
            stage: TransformStage::Isolate,
            ..
        } => ISOLATE_FAILED_MESSAGE,
        TransformError::ProcessingFailure {
            stage: TransformStage::Stylize,
            ..
        } => STYLIZE_FAILED_MESSAGE,
    }
}

/// Owns one session's [`PipelineRun`] and drives it through both stages
#[derive(Clone)]
pub struct PipelineController {
    client: Arc<TransformClient>,
    run: Arc<RwLock<PipelineRun>>,
    events: broadcast::Sender<RunSnapshot>,
}

impl PipelineController {
    pub fn new(client: Arc<TransformClient>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            run: Arc::new(RwLock::new(PipelineRun::default())),
            events,
        }
    }

    /// Start a new run for `image`.
    ///
    /// Rejected while another run is in flight. The returned handle may be
    /// dropped; the run carries on regardless.
    pub async fn submit(
        &self,
        image: DataUri,
        credential: Option<ApiKey>,
    ) -> Result<RunHandle, PipelineError> {
        let run_id = {
            let mut run = self.run.write().await;
            if run.is_processing() {
                return Err(PipelineError::Busy { run_id: run.run_id });
            }
            let run_id = run.run_id + 1;
            *run = PipelineRun::start(run_id, image.clone());
            self.publish(&run);
            run_id
        };

        tracing::info!(
            run_id,
            mime = image.mime(),
            has_credential = credential.is_some(),
            "Pipeline run started"
        );

        let driver = self.clone();
        let task = tokio::spawn(async move { driver.drive(run_id, image, credential).await });

        Ok(RunHandle { run_id, task })
    }

    /// Discard the current run, whatever its stage.
    ///
    /// An in-flight remote call is not aborted; its result is ignored.
    pub async fn reset(&self) -> RunSnapshot {
        let mut run = self.run.write().await;
        if run.is_processing() {
            tracing::info!(run_id = run.run_id, stage = ?run.stage, "Abandoning in-flight run");
        }
        *run = PipelineRun::idle(run.run_id + 1);
        self.publish(&run);
        run.snapshot()
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        self.run.read().await.snapshot()
    }

    /// Whether a run is in flight, without copying its images
    pub async fn is_processing(&self) -> bool {
        self.run.read().await.is_processing()
    }

    /// Copy of the current run record
    pub async fn current(&self) -> PipelineRun {
        self.run.read().await.clone()
    }

    /// Number of open subscriptions, such as live event streams
    pub fn watcher_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Receive a snapshot after every transition
    pub fn subscribe(&self) -> broadcast::Receiver<RunSnapshot> {
        self.events.subscribe()
    }

    async fn drive(self, run_id: u64, source: DataUri, credential: Option<ApiKey>) -> RunOutcome {
        let isolated = match self.client.isolate_subject(&source, credential.as_ref()).await {
            Ok(image) => image,
            Err(e) => return self.fail(run_id, e).await,
        };

        let recorded = self
            .apply(run_id, |run| run.record_isolated(isolated.clone()))
            .await;
        if !recorded {
            return RunOutcome::Abandoned;
        }

        // Stylize only ever sees the image isolated within this run
        match self.client.stylize(&isolated, credential.as_ref()).await {
            Ok(image) => {
                if self.apply(run_id, |run| run.record_final(image.clone())).await {
                    tracing::info!(run_id, "Pipeline run succeeded");
                    RunOutcome::Completed(image)
                } else {
                    RunOutcome::Abandoned
                }
            }
            Err(e) => self.fail(run_id, e).await,
        }
    }

    async fn fail(&self, run_id: u64, error: TransformError) -> RunOutcome {
        let message = user_message(&error);
        if self.apply(run_id, |run| run.record_failure(message)).await {
            tracing::warn!(run_id, error = %error, "Pipeline run failed");
            RunOutcome::Failed(error)
        } else {
            RunOutcome::Abandoned
        }
    }

    /// Apply a transition if `run_id` is still the current run
    async fn apply<F>(&self, run_id: u64, transition: F) -> bool
    where
        F: FnOnce(&mut PipelineRun),
    {
        let mut run = self.run.write().await;
        if run.run_id != run_id {
            tracing::debug!(
                run_id,
                current = run.run_id,
                "Discarding result of abandoned run"
            );
            return false;
        }
        transition(&mut run);
        self.publish(&run);
        true
    }

    fn publish(&self, run: &PipelineRun) {
        // No subscribers is fine
        let _ = self.events.send(run.snapshot());
    }
}
