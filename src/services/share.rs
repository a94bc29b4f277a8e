use serde::Serialize;
use utoipa::ToSchema;

use crate::models::PipelineRun;

/// File name offered for download and share
pub const PORTRAIT_FILE_NAME: &str = "pixel-me.png";

const SHARE_TITLE: &str = "My Pixel Art Portrait";
const SHARE_TEXT: &str = "I created this with the PixelMe app!";

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("There is no finished portrait to share")]
    NothingToShare,
}

/// Everything the browser's native share sheet needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub file_name: String,
    pub mime_type: String,
    /// The portrait as a data URI
    pub data_uri: String,
}

impl SharePayload {
    /// Build the payload for a finished run.
    ///
    /// Never touches the run itself; a failed share leaves the portrait
    /// available.
    pub fn for_run(run: &PipelineRun) -> Result<Self, ShareError> {
        let image = run.final_image.as_ref().ok_or(ShareError::NothingToShare)?;

        Ok(Self {
            title: SHARE_TITLE.to_string(),
            text: SHARE_TEXT.to_string(),
            file_name: PORTRAIT_FILE_NAME.to_string(),
            mime_type: image.mime().to_string(),
            data_uri: image.to_string(),
        })
    }
}
