pub mod config;
pub mod data_uri;
pub mod run;
pub mod session;

pub use config::{AppConfig, ConfigError, ModelConfig, PromptConfig, SafetyConfig, SafetySetting};
pub use data_uri::{DataUri, DataUriError, SUPPORTED_UPLOAD_TYPES};
pub use run::{PipelineRun, RunSnapshot, RunStatus, Stage};
pub use session::{ApiKey, SessionId};
