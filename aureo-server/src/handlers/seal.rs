//! Seal creation handler
//!
//! Handles POST /seal requests that embed the golden-spiral seal into an image.

use axum::{
    extract::{Multipart, State},
    Json,
};
use aureo_core::{EmbedOptions, SealRecord};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::run_on_pool;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::validation::parse_anchor;

/// Response for successful seal creation
#[derive(Debug, Serialize)]
pub struct SealResponse {
    /// Identifier in `MBH-YYYYMM-NNNN` form
    pub seal_id: String,
    /// Base64-encoded sealed image, same container as the upload
    pub sealed_image: String,
    /// Creation time in milliseconds since Unix epoch
    pub created_at_ms: i64,
    /// Wall-clock embed time
    pub processing_time_ms: u64,
    pub author_id: String,
    pub width: u32,
    pub height: u32,
    /// Record to keep for later verification
    pub record: SealRecord,
    /// Digest of the block a detector samples from the sealed image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
}

/// Seal an uploaded image
///
/// Accepts multipart/form-data with:
/// - **file** (required): PNG or JPEG image
/// - **author_id** (required): identifier of the sealing author
/// - **anchor_x**, **anchor_y** (optional): relative seal centre in `[0, 1]`
pub async fn seal_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SealResponse>, ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let file = fields.take_file()?;
    let author_id = fields.require_text("author_id")?.to_string();
    let anchor = parse_anchor(
        fields.get_parsed("anchor_x")?,
        fields.get_parsed("anchor_y")?,
        state.sealer.config().default_anchor,
    )?;

    tracing::debug!(
        file_name = ?file.file_name,
        bytes = file.data.len(),
        anchor = ?anchor,
        "Seal requested"
    );

    let mut options = EmbedOptions::new(author_id);
    if let Some(anchor) = anchor {
        options = options.with_anchor(anchor);
    }

    let sealer = state.sealer.clone();
    let sealed = run_on_pool(&state.pool, state.request_timeout, move |token| {
        sealer.embed_with_cancel(&file.data, &options, token)
    })
    .await???;

    Ok(Json(SealResponse {
        seal_id: sealed.seal_id,
        sealed_image: BASE64.encode(&sealed.image),
        created_at_ms: sealed.created_at_ms,
        processing_time_ms: sealed.processing_time_ms,
        author_id: sealed.author_id,
        width: sealed.width,
        height: sealed.height,
        record: sealed.record,
        block_hash: sealed.block_hash,
    }))
}
