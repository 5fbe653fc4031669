//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};

/// Question used when the caller does not ask one
pub const DEFAULT_QUESTION: &str = "extract text from image";

/// Extract-text request
///
/// Every field is optional on the wire so missing values can be reported as
/// validation errors instead of extractor rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractTextRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub enable_thinking: Option<bool>,
}

/// Validated extract-text request with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub image: String,
    pub question: String,
    pub enable_thinking: bool,
}

impl ExtractTextRequest {
    /// Apply defaults; `None` when no image was supplied.
    pub fn into_extraction(self) -> Option<ExtractionRequest> {
        let image = self.image.filter(|image| !image.trim().is_empty())?;
        let question = self
            .question
            .filter(|question| !question.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_QUESTION.to_string());

        Some(ExtractionRequest {
            image,
            question,
            enable_thinking: self.enable_thinking.unwrap_or(false),
        })
    }
}

/// Process-url request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Response of upload-image and process-url
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDataResponse {
    pub success: bool,
    pub image_data: String,
    pub message: String,
}

impl ImageDataResponse {
    pub fn ok(image_data: String, message: impl Into<String>) -> Self {
        Self {
            success: true,
            image_data,
            message: message.into(),
        }
    }
}

/// Health probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

/// User-facing messages
pub mod messages {
    pub const NO_IMAGE_DATA: &str = "no image data";
    pub const NO_IMAGE_FILE: &str = "no image file found";
    pub const NO_FILE_SELECTED: &str = "no file selected";
    pub const EMPTY_IMAGE_FILE: &str = "empty image file";
    pub const NO_IMAGE_URL: &str = "no image url provided";
    pub const UPLOAD_SUCCEEDED: &str = "upload succeeded";
    pub const URL_PROCESSED: &str = "url processed";
}
