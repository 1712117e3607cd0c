//! POST /api/upload: multipart `file` (or `image`) field, stored through [`ObjectStorage`]

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::upload::{ObjectStorage, UploadError};
use crate::{EcommerceError, Result};

#[derive(Serialize)]
pub struct UploadResponse { pub url: String }

impl From<UploadError> for EcommerceError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Io(e) => EcommerceError::Internal(format!("upload write failed: {e}")),
            other => EcommerceError::Validation(other.to_string()),
        }
    }
}

pub async fn upload(
    State(storage): State<Arc<dyn ObjectStorage>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let malformed = |e: MultipartError| EcommerceError::Validation(format!("Multipart error: {e}"));
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if !matches!(field.name(), Some("file") | Some("image")) { continue; }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| EcommerceError::Validation(format!("Read error: {e}")))?;
        let url = storage.put(file_name.as_deref(), &bytes).await?;
        return Ok(Json(UploadResponse { url }));
    }
    Err(EcommerceError::Validation("No file uploaded".into()))
}
