use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::info;

use crate::{
    config::DEFAULT_JPEG_QUALITY,
    error::{ClipsightError, Result},
    process::{ToolError, run_tool},
    types::{FRAME_MIME_TYPE, FrameSample, SamplingParams},
};

/// Zero-padded so lexicographic order is temporal order.
pub const FRAME_PATTERN: &str = "f_%06d.jpg";
const FRAME_EXT: &str = "jpg";

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Writes one image per `params.frame_interval_seconds` of `media` into `out_dir`,
    /// named after [`FRAME_PATTERN`].
    async fn extract(
        &self,
        media: &Path,
        params: &SamplingParams,
        out_dir: &Path,
    ) -> std::result::Result<(), ToolError>;
}

pub struct Ffmpeg {
    binary: String,
    timeout: Duration,
    jpeg_quality: u8,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(2, 31);
        self
    }

    pub fn build_args(&self, media: &Path, params: &SamplingParams, out_dir: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            media.to_string_lossy().into_owned(),
            "-vf".to_string(),
            format!("fps=1/{}", params.frame_interval_seconds),
            "-q:v".to_string(),
            self.jpeg_quality.to_string(),
            // anything past max_frames would be truncated anyway; ffmpeg parses this as int64
            "-frames:v".to_string(),
            params.max_frames.min(i64::MAX as usize).to_string(),
            out_dir.join(FRAME_PATTERN).to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for Ffmpeg {
    async fn extract(
        &self,
        media: &Path,
        params: &SamplingParams,
        out_dir: &Path,
    ) -> std::result::Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(media, params, out_dir));
        run_tool(cmd, self.timeout).await.map(|_| ())
    }
}

pub struct FrameSampler {
    extractor: Arc<dyn FrameExtractor>,
}

impl FrameSampler {
    pub fn new(extractor: Arc<dyn FrameExtractor>) -> Self {
        Self { extractor }
    }

    /// Extracts into `out_dir` and returns at most `params.max_frames` samples.
    /// An empty result (clip shorter than one interval) is not an error.
    pub async fn sample(
        &self,
        media: &Path,
        params: &SamplingParams,
        out_dir: &Path,
    ) -> Result<Vec<FrameSample>> {
        fs::create_dir_all(out_dir).await?;

        self.extractor
            .extract(media, params, out_dir)
            .await
            .map_err(|e| ClipsightError::extraction_failed(&e))?;

        let frames = collect_frames(out_dir, params).await?;
        info!(frames = frames.len(), "frames sampled");
        Ok(frames)
    }
}

/// Sorts the extracted images by name, keeps the first `max_frames` and
/// stamps each with `index * frame_interval_seconds`.
pub async fn collect_frames(dir: &Path, params: &SamplingParams) -> Result<Vec<FrameSample>> {
    let mut names: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(FRAME_EXT))
            .unwrap_or(false);
        if is_frame && entry.file_type().await?.is_file() {
            names.push(path);
        }
    }

    names.sort();
    names.truncate(params.max_frames);

    let mut frames = Vec::with_capacity(names.len());
    for (index, path) in names.into_iter().enumerate() {
        frames.push(FrameSample {
            index,
            timestamp_seconds: index as f64 * params.frame_interval_seconds,
            image_bytes: fs::read(&path).await?,
            mime_type: FRAME_MIME_TYPE.to_string(),
        });
    }
    Ok(frames)
}
