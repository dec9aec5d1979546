use crate::types::{
    AnalysisResult, FrameSample, MediaMeta, MediaSource, ProbeResult, TranscriptCue,
};

/// Everything the pipeline learned about one request.
pub struct Findings {
    pub probe: ProbeResult,
    pub transcript: Option<Vec<TranscriptCue>>,
    pub thumbs: Vec<FrameSample>,
    /// Winning fetch strategy for remote sources.
    pub strategy: Option<String>,
}

pub fn assemble(source: &MediaSource, findings: Findings) -> AnalysisResult {
    let meta = match source {
        MediaSource::Upload { filename, .. } => MediaMeta {
            title: Some(filename.clone()),
            source_url: None,
            duration_seconds: findings.probe.duration_seconds,
        },
        MediaSource::Remote { url, .. } => MediaMeta {
            title: None,
            source_url: Some(url.clone()),
            duration_seconds: findings.probe.duration_seconds,
        },
    };

    let notes = provenance_notes(
        source,
        findings.transcript.is_some(),
        findings.strategy.as_deref(),
    );

    AnalysisResult {
        meta,
        transcript: findings.transcript.unwrap_or_default(),
        thumbs: findings.thumbs,
        notes,
    }
}

/// `source=remote; subs=none; cookies=provided; strategy=web-mp4`
pub fn provenance_notes(source: &MediaSource, subtitles: bool, strategy: Option<&str>) -> String {
    let flag = |present: bool| if present { "provided" } else { "none" };

    let mut notes = format!(
        "source={}; subs={}; cookies={}",
        source.kind(),
        flag(subtitles),
        flag(source.has_credential()),
    );
    if let Some(strategy) = strategy {
        notes.push_str("; strategy=");
        notes.push_str(strategy);
    }
    notes
}
