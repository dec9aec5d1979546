use crate::types::AnalysisResult;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

/// Format an analysis result as human-readable markdown
pub fn format_result_summary(result: &AnalysisResult) -> String {
    let mut output = String::new();

    let name = result
        .meta
        .title
        .as_deref()
        .or(result.meta.source_url.as_deref())
        .unwrap_or("(unnamed)");
    output.push_str(&format!("# {}\n\n", name));

    output.push_str(&format!(
        "**Duration:** {} | **Frames:** {} | **Cues:** {}\n\n",
        format_timestamp(result.meta.duration_seconds),
        result.thumbs.len(),
        result.transcript.len()
    ));
    output.push_str(&format!("_{}_\n\n", result.notes));

    if !result.thumbs.is_empty() {
        output.push_str("## Frames\n\n");
        for thumb in &result.thumbs {
            output.push_str(&format!(
                "• #{} at {} ({})\n",
                thumb.index,
                format_timestamp(thumb.timestamp_seconds),
                format_bytes(thumb.image_bytes.len())
            ));
        }
        output.push('\n');
    }

    if !result.transcript.is_empty() {
        output.push_str("## Transcript\n\n");
        for cue in &result.transcript {
            output.push_str(&format!(
                "[{} → {}] {}\n",
                cue.start_mark, cue.end_mark, cue.text
            ));
        }
        output.push('\n');
    }

    output
}
