use serde::{Deserialize, Serialize};

use crate::{
    credentials::Credential,
    error::{ClipsightError, Result},
};

pub const DEFAULT_FRAME_INTERVAL_SECONDS: f64 = 10.0;
pub const DEFAULT_MAX_FRAMES: usize = 6;
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// Where the media comes from.
#[derive(Debug, Clone)]
pub enum MediaSource {
    Upload { bytes: Vec<u8>, filename: String },
    Remote {
        url: String,
        credential: Option<Credential>,
    },
}

impl MediaSource {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaSource::Upload { .. } => "upload",
            MediaSource::Remote { .. } => "remote",
        }
    }

    /// Filename for uploads, URL for remote sources.
    pub fn label(&self) -> &str {
        match self {
            MediaSource::Upload { filename, .. } => filename,
            MediaSource::Remote { url, .. } => url,
        }
    }

    pub fn has_credential(&self) -> bool {
        matches!(
            self,
            MediaSource::Remote {
                credential: Some(_),
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub frame_interval_seconds: f64,
    pub max_frames: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            frame_interval_seconds: DEFAULT_FRAME_INTERVAL_SECONDS,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source: MediaSource,
    pub sampling: SamplingParams,
    pub subtitle: Option<String>,
}

impl AnalysisRequest {
    pub fn upload(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Upload {
                bytes,
                filename: filename.into(),
            },
            sampling: SamplingParams::default(),
            subtitle: None,
        }
    }

    pub fn remote(url: impl Into<String>, credential: Option<Credential>) -> Self {
        Self {
            source: MediaSource::Remote {
                url: url.into(),
                credential,
            },
            sampling: SamplingParams::default(),
            subtitle: None,
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_subtitle(mut self, subtitle: Option<String>) -> Self {
        self.subtitle = subtitle;
        self
    }

    /// Rejects requests that can never succeed. Runs before any scratch space is allocated.
    pub fn validate(&self) -> Result<()> {
        let interval = self.sampling.frame_interval_seconds;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ClipsightError::invalid(format!(
                "frame_interval_seconds must be a positive number, got {interval}"
            )));
        }
        if self.sampling.max_frames == 0 {
            return Err(ClipsightError::invalid("max_frames must be at least 1"));
        }

        match &self.source {
            MediaSource::Upload { bytes, .. } if bytes.is_empty() => {
                Err(ClipsightError::invalid("uploaded file is empty"))
            }
            MediaSource::Upload { .. } => Ok(()),
            MediaSource::Remote { url, .. } => {
                let parsed = url::Url::parse(url.trim()).map_err(|e| {
                    ClipsightError::invalid(format!("url is not valid ({e})"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ClipsightError::invalid(
                        "only http:// and https:// urls are supported",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub index: usize,
    pub timestamp_seconds: f64,
    #[serde(rename = "image_base64", with = "base64_bytes")]
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptCue {
    pub start_mark: String,
    pub end_mark: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub meta: MediaMeta,
    pub transcript: Vec<TranscriptCue>,
    pub thumbs: Vec<FrameSample>,
    pub notes: String,
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampling(frame_interval_seconds: f64, max_frames: usize) -> SamplingParams {
        SamplingParams {
            frame_interval_seconds,
            max_frames,
        }
    }

    #[test]
    fn defaults_match_the_service_defaults() {
        let params = SamplingParams::default();
        assert_eq!(params.frame_interval_seconds, 10.0);
        assert_eq!(params.max_frames, 6);
    }

    #[test]
    fn rejects_bad_sampling_params() {
        for params in [
            sampling(0.0, 6),
            sampling(-1.0, 6),
            sampling(f64::NAN, 6),
            sampling(f64::INFINITY, 6),
            sampling(10.0, 0),
        ] {
            let req = AnalysisRequest::upload(vec![1, 2, 3], "clip.mp4").with_sampling(params);
            let err = req.validate().unwrap_err();
            assert!(err.is_client_error(), "{params:?} -> {err}");
        }
    }

    #[test]
    fn rejects_empty_upload() {
        let err = AnalysisRequest::upload(Vec::new(), "clip.mp4")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ClipsightError::InvalidRequest { .. }));
    }

    #[test]
    fn rejects_non_http_urls() {
        for url in ["", "not a url", "ftp://example.com/video.mp4", "file:///etc/passwd"] {
            let err = AnalysisRequest::remote(url, None).validate().unwrap_err();
            assert!(err.is_client_error(), "{url}");
        }
    }

    #[test]
    fn accepts_valid_requests() {
        AnalysisRequest::upload(vec![0; 16], "clip.mp4")
            .validate()
            .unwrap();
        AnalysisRequest::remote("https://www.youtube.com/watch?v=abc", None)
            .validate()
            .unwrap();
    }

    #[test]
    fn frame_bytes_serialize_as_base64() {
        let frame = FrameSample {
            index: 0,
            timestamp_seconds: 0.0,
            image_bytes: b"jpeg".to_vec(),
            mime_type: FRAME_MIME_TYPE.to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["image_base64"], "anBlZw==");
        assert_eq!(json["mime_type"], "image/jpeg");

        let back: FrameSample = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn meta_omits_absent_origin_fields() {
        let meta = MediaMeta {
            title: Some("clip.mp4".into()),
            source_url: None,
            duration_seconds: 30.0,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["title"], "clip.mp4");
        assert!(json.get("source_url").is_none());
    }
}
