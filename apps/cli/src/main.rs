use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use clipsight_core::{
    AnalysisRequest, AnalysisResult, Analyzer, AnalyzerConfig, Credential, SamplingParams,
    format_result_summary,
    types::{DEFAULT_FRAME_INTERVAL_SECONDS, DEFAULT_MAX_FRAMES},
};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "clipsight")]
#[command(about = "Sample preview frames and parse subtitles from a local file or a video URL")]
struct Cli {
    /// Local media file or http(s) URL
    source: String,

    /// Seconds between preview frames
    #[arg(short, long, default_value_t = DEFAULT_FRAME_INTERVAL_SECONDS)]
    interval: f64,

    /// Maximum number of preview frames
    #[arg(short, long, default_value_t = DEFAULT_MAX_FRAMES)]
    max_frames: usize,

    /// Companion subtitle file (SRT-style)
    #[arg(short, long)]
    subtitle: Option<PathBuf>,

    /// Cookies for remote sources: a `name=value; ...` string or a cookie-jar file
    #[arg(short, long)]
    cookies: Option<String>,

    /// Where to write the JSON result. Defaults to `<name>.analysis.json`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the sampled frames as JPEG files into this directory
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Timeout for each external tool, in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn is_remote(source: &str) -> bool {
    let lower = source.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Cookie argument is either inline text or a path to a file holding it.
async fn load_cookies(arg: &str) -> Result<Option<Credential>> {
    let path = Path::new(arg);
    let text = if path.is_file() {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("reading cookies from {}", path.display()))?
    } else {
        arg.to_string()
    };
    Ok(Credential::new(text))
}

fn default_output_path(source: &str) -> PathBuf {
    let stem = if is_remote(source) {
        "remote".to_string()
    } else {
        Path::new(source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string())
    };
    PathBuf::from(format!("{stem}.analysis.json"))
}

async fn build_request(cli: &Cli) -> Result<AnalysisRequest> {
    let request = if is_remote(&cli.source) {
        let credential = match &cli.cookies {
            Some(arg) => load_cookies(arg).await?,
            None => None,
        };
        AnalysisRequest::remote(cli.source.trim(), credential)
    } else {
        let path = Path::new(&cli.source);
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| cli.source.clone());
        AnalysisRequest::upload(bytes, filename)
    };

    let subtitle = match &cli.subtitle {
        Some(path) => {
            let raw = fs::read(path)
                .await
                .with_context(|| format!("reading subtitles from {}", path.display()))?;
            Some(String::from_utf8_lossy(&raw).into_owned())
        }
        None => None,
    };

    Ok(request
        .with_sampling(SamplingParams {
            frame_interval_seconds: cli.interval,
            max_frames: cli.max_frames,
        })
        .with_subtitle(subtitle))
}

async fn write_frames(result: &AnalysisResult, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).await?;
    for thumb in &result.thumbs {
        let path = dir.join(format!("frame_{:03}.jpg", thumb.index));
        fs::write(&path, &thumb.image_bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AnalyzerConfig::from_env();
    if let Some(secs) = cli.timeout.filter(|s| *s > 0) {
        config.tool_timeout_secs = secs;
    }
    let analyzer = Analyzer::new(&config);

    println!(
        "\n{}  {}\n",
        style("clipsight").cyan().bold(),
        style("Media Analyzer").dim()
    );

    let total_start = Instant::now();

    let request = build_request(&cli).await?;
    println!(
        "{} Source: {} {}",
        style("✓").green().bold(),
        style(request.source.label()).dim(),
        style(format!("({})", request.source.kind())).dim()
    );

    let spinner = create_spinner(if is_remote(&cli.source) {
        "Fetching, probing and sampling..."
    } else {
        "Probing and sampling..."
    });
    let result = match analyzer.analyze(&request).await {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), e));
            std::process::exit(1);
        }
    };
    spinner.finish_with_message(format!(
        "{} Sampled {} frames, {} cues {}",
        style("✓").green().bold(),
        result.thumbs.len(),
        result.transcript.len(),
        style(format!("[{}]", format_duration(total_start.elapsed()))).dim()
    ));

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.source));
    let pretty_json = serde_json::to_string_pretty(&result)?;
    fs::write(&output_path, &pretty_json)
        .await
        .with_context(|| format!("writing {}", output_path.display()))?;

    if let Some(dir) = &cli.frames_dir {
        write_frames(&result, dir).await?;
        println!(
            "{} Frames written to {}",
            style("✓").green().bold(),
            style(dir.display()).cyan()
        );
    }

    println!(
        "\n{} {}\n",
        style("Saved:").dim(),
        style(output_path.display()).cyan()
    );
    println!("{}", style("─".repeat(60)).dim());

    println!("{}", format_result_summary(&result));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://www.youtube.com/watch?v=1"));
        assert!(is_remote("  HTTP://example.com/a.mp4"));
        assert!(!is_remote("./clip.mp4"));
        assert!(!is_remote("/data/https.mp4"));
    }

    #[test]
    fn output_path_defaults() {
        assert_eq!(
            default_output_path("/videos/holiday.mp4"),
            PathBuf::from("holiday.analysis.json")
        );
        assert_eq!(
            default_output_path("https://vimeo.com/1"),
            PathBuf::from("remote.analysis.json")
        );
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[tokio::test]
    async fn cookies_from_text_or_file() {
        let inline = load_cookies("SID=1; HSID=2").await.unwrap().unwrap();
        assert_eq!(inline.as_str(), "SID=1; HSID=2");

        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("cookies.txt");
        std::fs::write(&jar, "# Netscape HTTP Cookie File\n").unwrap();
        let from_file = load_cookies(jar.to_str().unwrap()).await.unwrap().unwrap();
        assert!(from_file.as_str().starts_with("# Netscape"));

        assert!(load_cookies("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_sources_become_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.webm");
        std::fs::write(&clip, b"bytes").unwrap();

        let cli = Cli::parse_from(["clipsight", clip.to_str().unwrap(), "-m", "3"]);
        let request = build_request(&cli).await.unwrap();

        assert_eq!(request.source.kind(), "upload");
        assert_eq!(request.source.label(), "clip.webm");
        assert_eq!(request.sampling.max_frames, 3);
        assert!(request.subtitle.is_none());
    }
}
