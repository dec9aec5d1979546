use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clipsight_core::{
    AnalysisRequest, AnalysisResult, ClipsightError, Credential, MediaSource, SamplingParams,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

/// Error returned to HTTP callers: a status code and a message safe to show.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ClipsightError> for ApiError {
    fn from(e: ClipsightError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self {
            status: e.status(),
            message: format!("Invalid multipart body: {}", e.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "analysis failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }
        let body = ErrorBody {
            error: self.message,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Multipart form accepted by `POST /analyze`, before validation.
#[derive(Default)]
struct AnalyzeForm {
    video: Option<(Vec<u8>, String)>,
    url: Option<String>,
    cookies: Option<String>,
    subtitle: Option<String>,
    frame_interval_seconds: Option<f64>,
    max_frames: Option<usize>,
}

impl AnalyzeForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "video" => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let bytes = field.bytes().await?;
                    form.video = Some((bytes.to_vec(), filename));
                }
                "url" => form.url = non_blank(field.text().await?),
                "cookies" => form.cookies = non_blank(field.text().await?),
                "subtitle" => {
                    let bytes = field.bytes().await?;
                    form.subtitle = Some(String::from_utf8_lossy(&bytes).into_owned());
                }
                "frame_interval_seconds" => {
                    let raw = field.text().await?;
                    let value = raw.trim().parse::<f64>().map_err(|_| {
                        ApiError::bad_request(format!(
                            "frame_interval_seconds is not a number: {raw:?}"
                        ))
                    })?;
                    form.frame_interval_seconds = Some(value);
                }
                "max_frames" => {
                    let raw = field.text().await?;
                    let value = raw.trim().parse::<usize>().map_err(|_| {
                        ApiError::bad_request(format!(
                            "max_frames is not a non-negative integer: {raw:?}"
                        ))
                    })?;
                    form.max_frames = Some(value);
                }
                other => debug!(field = other, "ignoring unknown multipart field"),
            }
        }

        Ok(form)
    }

    fn into_request(self) -> Result<AnalysisRequest, ApiError> {
        let source = match (self.video, self.url) {
            (Some(_), Some(_)) => {
                return Err(ApiError::bad_request(
                    "Send either a video file or a url, not both",
                ));
            }
            (None, None) => {
                return Err(ApiError::bad_request("Send a video file or a url"));
            }
            (Some((bytes, filename)), None) => MediaSource::Upload { bytes, filename },
            (None, Some(url)) => MediaSource::Remote {
                url,
                credential: self.cookies.and_then(Credential::new),
            },
        };

        let defaults = SamplingParams::default();
        Ok(AnalysisRequest {
            source,
            sampling: SamplingParams {
                frame_interval_seconds: self
                    .frame_interval_seconds
                    .unwrap_or(defaults.frame_interval_seconds),
                max_frames: self.max_frames.unwrap_or(defaults.max_frames),
            },
            subtitle: self.subtitle,
        })
    }
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let request = AnalyzeForm::read(multipart).await?.into_request()?;
    let result = state.analyzer.analyze(&request).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_needs_exactly_one_source() {
        let err = AnalyzeForm::default().into_request().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let both = AnalyzeForm {
            video: Some((vec![1], "a.mp4".to_string())),
            url: Some("https://vimeo.com/1".to_string()),
            ..Default::default()
        };
        assert_eq!(both.into_request().unwrap_err().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn form_defaults_sampling() {
        let form = AnalyzeForm {
            url: Some("https://vimeo.com/1".to_string()),
            cookies: Some("a=1".to_string()),
            ..Default::default()
        };
        let request = form.into_request().unwrap();
        assert_eq!(request.sampling, SamplingParams::default());
        assert!(request.source.has_credential());
    }

    #[test]
    fn pipeline_errors_map_to_status_codes() {
        let client: ApiError = ClipsightError::invalid("bad").into();
        assert_eq!(client.status, StatusCode::BAD_REQUEST);

        let server: ApiError = ClipsightError::ExtractionFailed {
            reason: "boom".to_string(),
        }
        .into();
        assert_eq!(server.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.message, "Frame extraction failed: boom");
    }

    #[test]
    fn blank_text_fields_are_absent() {
        assert_eq!(non_blank("   ".to_string()), None);
        assert_eq!(non_blank(" x ".to_string()).as_deref(), Some("x"));
    }
}
