use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// MIME types accepted for uploaded photos
pub const SUPPORTED_UPLOAD_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// Error parsing a data URI
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUriError {
    #[error("Data URI must start with 'data:'")]
    MissingScheme,

    #[error("Data URI has no MIME type")]
    MissingMimeType,

    #[error("Data URI is not base64 encoded")]
    NotBase64,

    #[error("Data URI payload is not valid base64: {0}")]
    InvalidPayload(String),
}

/// An image embedded as `data:<mime>;base64,<payload>`.
///
/// Construction always validates the payload, so a `DataUri` in hand is
/// known to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime: String,
    payload: String,
}

impl DataUri {
    /// Parse the textual form.
    pub fn parse(s: &str) -> Result<Self, DataUriError> {
        let rest = s.trim().strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::NotBase64)?;

        // Header is "<mime>[;param=value]*;base64"
        let mut parts = header.split(';');
        let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if mime.is_empty() || !mime.contains('/') {
            return Err(DataUriError::MissingMimeType);
        }
        if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(DataUriError::NotBase64);
        }

        STANDARD
            .decode(payload)
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))?;

        Ok(Self {
            mime,
            payload: payload.to_string(),
        })
    }

    /// Encode raw bytes under the given MIME type.
    pub fn from_bytes(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime: mime.into().to_ascii_lowercase(),
            payload: STANDARD.encode(bytes),
        }
    }

    /// Build from a MIME type and an already base64-encoded payload,
    /// as returned by the model API.
    pub fn from_base64(mime: impl Into<String>, payload: impl Into<String>) -> Result<Self, DataUriError> {
        let mime = mime.into().to_ascii_lowercase();
        if mime.is_empty() || !mime.contains('/') {
            return Err(DataUriError::MissingMimeType);
        }
        let payload = payload.into();
        STANDARD
            .decode(&payload)
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))?;
        Ok(Self { mime, payload })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Base64 payload without the header
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decoded image bytes
    pub fn decode(&self) -> Vec<u8> {
        // Payload was validated on construction
        STANDARD.decode(&self.payload).unwrap_or_default()
    }

    /// Whether this image may be submitted as a source photo
    pub fn is_supported_upload(&self) -> bool {
        SUPPORTED_UPLOAD_TYPES.contains(&self.mime.as_str())
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, self.payload)
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
