//! Media upload collaborator used by the composer.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use telecare_shared::model::Attachment;

use crate::api::ApiClient;
use crate::error::ApiError;

/// Uploads a staged file and returns its hosted `{url, format}`.
/// A trait so the composer can be exercised without a backend.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<Attachment, ApiError>;
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    #[allow(dead_code)]
    message: String,
    data: Attachment,
}

#[async_trait]
impl MediaUploader for ApiClient {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<Attachment, ApiError> {
        debug!(file = %file_name, size = bytes.len(), "Uploading attachment");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http()
            .post(self.endpoint("/media/upload"))
            .multipart(form)
            .send()
            .await?;

        let body: UploadEnvelope = crate::api::read_json(response).await?;
        Ok(body.data)
    }
}
