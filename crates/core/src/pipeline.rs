use std::{path::PathBuf, sync::Arc};

use tracing::{Instrument, info, info_span};

use crate::{
    assemble::{Findings, assemble},
    config::AnalyzerConfig,
    error::Result,
    frames::{Ffmpeg, FrameExtractor, FrameSampler},
    probe::{DurationProbe, Ffprobe},
    source::{FetchStrategy, RemoteFetcher, SourceAcquirer, YtDlp},
    subtitle::parse_subtitles,
    types::{AnalysisRequest, AnalysisResult},
    workspace::ScopedWorkspace,
};

const FRAMES_DIR: &str = "frames";

/// Runs the whole ingestion pipeline for one request at a time; share it
/// behind an `Arc` to serve many requests concurrently.
pub struct Analyzer {
    scratch_root: PathBuf,
    acquirer: SourceAcquirer,
    probe: Arc<dyn DurationProbe>,
    sampler: FrameSampler,
}

impl Analyzer {
    /// Analyzer backed by `yt-dlp`, `ffprobe` and `ffmpeg`.
    pub fn new(config: &AnalyzerConfig) -> Self {
        let timeout = config.tool_timeout();
        Self::with_tools(
            config.scratch_root.clone(),
            Arc::new(YtDlp::new(&config.ytdlp_bin, timeout)),
            config.strategies.clone(),
            Arc::new(Ffprobe::new(&config.ffprobe_bin, timeout)),
            Arc::new(Ffmpeg::new(&config.ffmpeg_bin, timeout).with_jpeg_quality(config.jpeg_quality)),
        )
    }

    pub fn with_tools(
        scratch_root: PathBuf,
        fetcher: Arc<dyn RemoteFetcher>,
        strategies: Vec<FetchStrategy>,
        probe: Arc<dyn DurationProbe>,
        extractor: Arc<dyn FrameExtractor>,
    ) -> Self {
        Self {
            scratch_root,
            acquirer: SourceAcquirer::new(fetcher, strategies),
            probe,
            sampler: FrameSampler::new(extractor),
        }
    }

    /// Validates, acquires, probes, samples and parses. The request's
    /// workspace is gone by the time this returns, whatever the outcome, and
    /// also if the returned future is dropped half way.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        request.validate()?;

        let workspace = ScopedWorkspace::open(&self.scratch_root).await?;
        let span = info_span!(
            "analyze",
            request_id = %workspace.id(),
            source = request.source.kind()
        );

        self.run(request, &workspace)
            .instrument(span)
            .await
            .map_err(|e| e.redact_path(workspace.path()))
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        workspace: &ScopedWorkspace,
    ) -> Result<AnalysisResult> {
        let acquired = self.acquirer.acquire(&request.source, workspace).await?;

        let frames_dir = workspace.subdir(FRAMES_DIR).await?;
        // both only read the acquired file
        let (probe, thumbs) = tokio::join!(
            self.probe.probe(&acquired.path),
            self.sampler
                .sample(&acquired.path, &request.sampling, &frames_dir)
        );
        let thumbs = thumbs?;

        let transcript = request.subtitle.as_deref().map(parse_subtitles);

        info!(
            duration_seconds = probe.duration_seconds,
            frames = thumbs.len(),
            cues = transcript.as_ref().map(Vec::len).unwrap_or(0),
            "analysis complete"
        );

        Ok(assemble(
            &request.source,
            Findings {
                probe,
                transcript,
                thumbs,
                strategy: acquired.strategy,
            },
        ))
    }
}
