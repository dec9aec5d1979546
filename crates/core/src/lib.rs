//! Clipsight Core Library
//!
//! Turns an uploaded file or a remote URL into a normalized analysis artifact:
//! coarse metadata, evenly spaced preview frames and an optional transcript
//! parsed from a companion subtitle file.

pub mod assemble;
pub mod config;
pub mod credentials;
pub mod error;
pub mod format;
pub mod frames;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod source;
pub mod subtitle;
pub mod types;
pub mod workspace;

// Re-export commonly used items at crate root
pub use config::AnalyzerConfig;
pub use credentials::{Credential, jar_to_header, to_jar_format};
pub use error::{ClipsightError, Result};
pub use format::{format_result_summary, format_timestamp};
pub use pipeline::Analyzer;
pub use source::FetchStrategy;
pub use subtitle::parse_subtitles;
pub use types::{
    AnalysisRequest, AnalysisResult, FrameSample, MediaMeta, MediaSource, ProbeResult,
    SamplingParams, TranscriptCue,
};
pub use workspace::ScopedWorkspace;
