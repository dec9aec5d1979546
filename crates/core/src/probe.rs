use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

use crate::{process::run_tool, types::ProbeResult};

/// Duration lookup. Advisory only: implementations never fail, they report zero.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe(&self, media: &Path) -> ProbeResult;
}

pub struct Ffprobe {
    binary: String,
    timeout: Duration,
}

impl Ffprobe {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DurationProbe for Ffprobe {
    async fn probe(&self, media: &Path) -> ProbeResult {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("json")
            .arg(media);

        let output = match run_tool(cmd, self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "probe failed, reporting zero duration");
                return ProbeResult::default();
            }
        };

        match parse_probe_output(&output.stdout) {
            Some(duration_seconds) => ProbeResult { duration_seconds },
            None => {
                warn!("probe output had no usable duration, reporting zero");
                ProbeResult::default()
            }
        }
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<serde_json::Value>,
}

/// Reads `format.duration` from ffprobe's JSON. ffprobe emits it as a string,
/// but a bare number is accepted too.
pub fn parse_probe_output(stdout: &[u8]) -> Option<f64> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout).ok()?;
    let duration = match parsed.format?.duration? {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (duration.is_finite() && duration >= 0.0).then_some(duration)
}
