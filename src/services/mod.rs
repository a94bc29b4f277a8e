pub mod controller;
pub mod credential_store;
pub mod session_registry;
pub mod share;
pub mod transform_client;

pub use controller::{PipelineController, PipelineError, RunHandle, RunOutcome};
pub use credential_store::{CredentialSource, CredentialStore};
pub use session_registry::{
    spawn_idle_sweeper, InMemorySessionRegistry, Session, SessionRegistry,
};
pub use share::{ShareError, SharePayload, PORTRAIT_FILE_NAME};
pub use transform_client::{
    GeminiModel, GenerateRequest, ImageModel, ModelError, TransformClient, TransformStage,
};
