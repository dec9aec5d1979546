//! Parser for blank-line separated timed-text subtitles (SRT and friends).
//!
//! Parsing never fails. Blocks that do not look like a cue, such as a
//! `WEBVTT` header or a stray note, are left out of the output.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::TranscriptCue;

pub const TIMING_SEPARATOR: &str = "-->";

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    // a line break, any whitespace, another line break: at least one blank line
    Regex::new(r"\n\s*\n").expect("static regex")
});

pub fn parse_subtitles(raw: &str) -> Vec<TranscriptCue> {
    BLOCK_BREAK
        .split(raw.trim())
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<TranscriptCue> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 2 {
        return None;
    }

    let (start, end) = lines[1].split_once(TIMING_SEPARATOR)?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() {
        return None;
    }

    Some(TranscriptCue {
        start_mark: start.to_string(),
        end_mark: end.to_string(),
        text: lines[2..].join(" "),
    })
}
