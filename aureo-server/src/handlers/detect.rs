//! Seal detection handler
//!
//! Handles POST /detect requests. Detection runs blind on the worker pool
//! under a fixed time budget; a scan that overruns it is cancelled and
//! reported as inconclusive rather than as a missing seal.

use axum::{
    extract::{Multipart, State},
    Json,
};
use aureo_core::{DetectionResult, PoolError, SignatureAnalysis, MAX_SIGNATURE_SCORE};
use serde::Serialize;

use crate::error::ApiError;
use crate::handlers::run_on_pool;
use crate::multipart::MultipartFields;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectStatus {
    Found,
    NotFound,
    Inconclusive,
}

/// Response for a detection request
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub status: DetectStatus,
    /// Raw detector output (absent when inconclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DetectionResult>,
    /// Score and `firmaVisual` evidence
    #[serde(flatten)]
    pub signature: SignatureAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DetectResponse {
    fn from_result(result: DetectionResult, exif_score: u8) -> Self {
        let status = if result.found {
            DetectStatus::Found
        } else {
            DetectStatus::NotFound
        };
        Self {
            status,
            signature: SignatureAnalysis::fold(exif_score, &result),
            result: Some(result),
            reason: None,
        }
    }

    fn inconclusive(exif_score: u8, reason: String) -> Self {
        Self {
            status: DetectStatus::Inconclusive,
            result: None,
            signature: SignatureAnalysis::fold(exif_score, &DetectionResult::not_found()),
            reason: Some(reason),
        }
    }
}

/// Look for a seal in an uploaded image
///
/// Accepts multipart/form-data with:
/// - **file** (required): image to scan
/// - **exif_score** (optional): independent EXIF-based score (0-10) folded into the analysis
pub async fn detect_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let file = fields.take_file()?;
    let exif_score = match fields.get_parsed::<u8>("exif_score")? {
        Some(score) if score > MAX_SIGNATURE_SCORE => {
            return Err(ApiError::bad_request(format!(
                "exif_score must be between 0 and {}",
                MAX_SIGNATURE_SCORE
            )))
        }
        score => score.unwrap_or(0),
    };

    let detector = state.detector.clone();
    let outcome = run_on_pool(&state.pool, state.seal_timeout, move |token| {
        detector.detect_with_cancel(&file.data, token)
    })
    .await?;

    let response = match outcome {
        Ok(Ok(result)) => DetectResponse::from_result(result, exif_score),
        Ok(Err(e)) if e.is_inconclusive() => DetectResponse::inconclusive(exif_score, e.to_string()),
        Ok(Err(e)) => return Err(e.into()),
        Err(e @ PoolError::TimedOut(_)) => {
            tracing::warn!(error = %e, "Detection inconclusive");
            DetectResponse::inconclusive(exif_score, e.to_string())
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(status = ?response.status, score = response.signature.score, "Detection complete");
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aureo_core::Center;

    #[test]
    fn test_found_response_carries_firma_visual() {
        let result = DetectionResult {
            found: true,
            center: Some(Center { x: 10, y: 12 }),
            sampled_block: Some(vec![0; 64]),
            hash: Some("ab".into()),
        };
        let json = serde_json::to_value(DetectResponse::from_result(result, 3)).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["score"], 10);
        assert_eq!(json["firmaVisual"]["center"]["x"], 10);
        assert_eq!(json["result"]["found"], true);
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_not_found_keeps_exif_score() {
        let json =
            serde_json::to_value(DetectResponse::from_result(DetectionResult::not_found(), 4))
                .unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["score"], 4);
        assert!(json.get("firmaVisual").is_none());
    }

    #[test]
    fn test_inconclusive_has_reason_and_no_result() {
        let json =
            serde_json::to_value(DetectResponse::inconclusive(0, "timed out".into())).unwrap();
        assert_eq!(json["status"], "inconclusive");
        assert_eq!(json["reason"], "timed out");
        assert!(json.get("result").is_none());
    }
}
