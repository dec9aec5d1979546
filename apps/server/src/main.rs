//! API Server Binary Entry Point

use std::path::PathBuf;

use clap::Parser;
use clipsight_core::{Analyzer, AnalyzerConfig};
use clipsight_server::{AppState, DEFAULT_MAX_UPLOAD_MB, start_server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clipsight-server")]
#[command(about = "Analyze uploaded or remote media into preview frames and a transcript")]
struct Args {
    /// Address to bind
    #[arg(long, env = "CLIPSIGHT_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,

    /// Largest accepted request body, in MiB
    #[arg(long, env = "CLIPSIGHT_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,

    /// Per external tool invocation timeout, in seconds
    #[arg(long)]
    tool_timeout_secs: Option<u64>,

    /// Directory for per-request scratch workspaces
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

fn upload_limit_bytes(mib: usize) -> usize {
    mib.saturating_mul(1024 * 1024)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clipsight_server=info,clipsight_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AnalyzerConfig::from_env();
    if let Some(secs) = args.tool_timeout_secs.filter(|s| *s > 0) {
        config.tool_timeout_secs = secs;
    }
    if let Some(dir) = args.scratch_dir {
        config.scratch_root = dir;
    }

    tracing::info!(
        scratch_root = %config.scratch_root.display(),
        tool_timeout_secs = config.tool_timeout_secs,
        strategies = config.strategies.len(),
        "Starting clipsight server"
    );

    let state = AppState::new(Analyzer::new(&config));
    start_server(&args.addr, state, upload_limit_bytes(args.max_upload_mb)).await?;

    Ok(())
}
