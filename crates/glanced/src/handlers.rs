//! One-shot HTTP handlers: detect, recognize, register.
//!
//! These are the single-pass variants — no ephemeral cache writes and no
//! archival; that behavior belongs to the streaming session pipeline.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use glance_core::{FaceRegion, IdentityMatch};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DetectResponse {
    pub faces: Vec<FaceRegion>,
}

#[derive(Serialize)]
pub struct RecognizeResponse {
    pub recognized_faces: Vec<IdentityMatch>,
}

#[derive(Deserialize)]
pub struct RegisterQuery {
    pub name: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub name: String,
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// POST /api/recognition/detect — detect faces in an uploaded image.
pub async fn detect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let image = decode_upload(multipart).await?;
    let faces = state.detect(image.into()).await?;
    Ok(Json(DetectResponse { faces }))
}

/// POST /api/recognition/recognize — match every face in an uploaded image
/// against the registered identities.
pub async fn recognize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let image = std::sync::Arc::new(decode_upload(multipart).await?);
    let regions = state.detect(image.clone()).await?;
    if regions.is_empty() {
        return Ok(Json(RecognizeResponse {
            recognized_faces: Vec::new(),
        }));
    }

    let gallery = state.store.list_identities().await?;

    let mut recognized = Vec::new();
    for region in &regions {
        let crop = region.crop_from(&image);
        let embedding = state.embed(crop).await?;
        if let Some(matched) = state.matcher.find_match(&embedding, &gallery) {
            recognized.push(matched);
        }
    }

    Ok(Json(RecognizeResponse {
        recognized_faces: recognized,
    }))
}

/// POST /api/recognition/register?name= — register a new identity from the
/// first face found in the uploaded image.
pub async fn register(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
    multipart: Multipart,
) -> Result<Json<RegisterResponse>, ApiError> {
    let image = std::sync::Arc::new(decode_upload(multipart).await?);
    let regions = state.detect(image.clone()).await?;

    let Some(region) = regions.first() else {
        return Err(ApiError::bad_request("no face detected in image"));
    };

    let crop = region.crop_from(&image);
    let embedding = state.embed(crop).await?;
    let id = state.store.register_identity(&query.name, &embedding).await?;

    tracing::info!(id, name = %query.name, "identity registered");
    Ok(Json(RegisterResponse {
        id,
        name: query.name,
    }))
}

/// Pull the `file` field out of a multipart upload and decode it.
async fn decode_upload(mut multipart: Multipart) -> Result<RgbImage, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to parse multipart: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let data = file_data.ok_or_else(|| {
        ApiError::bad_request("no file provided; use the 'file' field in a multipart form")
    })?;

    let image = image::load_from_memory(&data)
        .map_err(|e| ApiError::bad_request(format!("could not decode image: {e}")))?;
    Ok(image.to_rgb8())
}
