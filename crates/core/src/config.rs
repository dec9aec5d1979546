use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{source::FetchStrategy, workspace::default_scratch_root};

pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_JPEG_QUALITY: u8 = 3;

/// Process-wide analyzer settings. Nothing in here changes per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub scratch_root: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ytdlp_bin: String,
    pub tool_timeout_secs: u64,
    /// ffmpeg `-q:v`, 2 (best) to 31 (worst).
    pub jpeg_quality: u8,
    pub strategies: Vec<FetchStrategy>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            strategies: FetchStrategy::default_chain(),
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overlaid with `CLIPSIGHT_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("CLIPSIGHT_SCRATCH_DIR").filter(|v| !v.trim().is_empty()) {
            self.scratch_root = PathBuf::from(dir);
        }
        if let Some(bin) = lookup("CLIPSIGHT_FFMPEG").filter(|v| !v.trim().is_empty()) {
            self.ffmpeg_bin = bin;
        }
        if let Some(bin) = lookup("CLIPSIGHT_FFPROBE").filter(|v| !v.trim().is_empty()) {
            self.ffprobe_bin = bin;
        }
        if let Some(bin) = lookup("CLIPSIGHT_YTDLP").filter(|v| !v.trim().is_empty()) {
            self.ytdlp_bin = bin;
        }
        if let Some(raw) = lookup("CLIPSIGHT_TOOL_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.tool_timeout_secs = secs,
                _ => warn!(value = %raw, "ignoring invalid CLIPSIGHT_TOOL_TIMEOUT_SECS"),
            }
        }
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}
