use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{fs, process::Command};
use tracing::{info, warn};

use crate::{
    credentials::{Credential, write_jar_file},
    error::{ClipsightError, Result},
    process::{ToolError, run_tool},
    types::MediaSource,
    workspace::ScopedWorkspace,
};

const DOWNLOAD_DIR: &str = "source";
const DOWNLOAD_TEMPLATE: &str = "media.%(ext)s";
const DEFAULT_UPLOAD_EXT: &str = "mp4";
const MAX_EXT_LEN: usize = 8;

const MOBILE_USER_AGENT: &str = "com.google.android.youtube/19.09.37 (Linux; U; Android 14) gzip";
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const MP4_PREFERENCE: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// One way of asking the fetch tool for the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchStrategy {
    pub name: String,
    /// Client identity the extractor should impersonate; `None` keeps the tool's default.
    pub player_client: Option<String>,
    pub user_agent: String,
    pub format: String,
    pub accept_language: String,
}

impl FetchStrategy {
    /// The built-in chain: two mp4-preferring client identities, then whatever
    /// the tool itself considers best.
    pub fn default_chain() -> Vec<Self> {
        vec![
            Self {
                name: "android-mp4".to_string(),
                player_client: Some("android".to_string()),
                user_agent: MOBILE_USER_AGENT.to_string(),
                format: MP4_PREFERENCE.to_string(),
                accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            },
            Self {
                name: "web-mp4".to_string(),
                player_client: Some("web".to_string()),
                user_agent: DESKTOP_USER_AGENT.to_string(),
                format: MP4_PREFERENCE.to_string(),
                accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            },
            Self {
                name: "best-available".to_string(),
                player_client: None,
                user_agent: DESKTOP_USER_AGENT.to_string(),
                format: "best".to_string(),
                accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            },
        ]
    }
}

/// Cookie material prepared once per request and attached to every attempt.
#[derive(Debug, Clone)]
pub struct AttachedCredential {
    pub jar_path: PathBuf,
    pub header: Option<String>,
}

pub struct FetchAttempt<'a> {
    pub url: &'a str,
    pub download_dir: &'a Path,
    pub strategy: &'a FetchStrategy,
    pub credential: Option<&'a AttachedCredential>,
}

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Downloads `attempt.url` into `attempt.download_dir` and returns the media file path.
    async fn fetch(&self, attempt: &FetchAttempt<'_>) -> std::result::Result<PathBuf, ToolError>;
}

/// `yt-dlp` driven fetcher.
pub struct YtDlp {
    binary: String,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn build_args(attempt: &FetchAttempt<'_>) -> Vec<String> {
        let strategy = attempt.strategy;
        let template = attempt.download_dir.join(DOWNLOAD_TEMPLATE);

        let mut args = vec![
            attempt.url.to_string(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-f".to_string(),
            strategy.format.clone(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--user-agent".to_string(),
            strategy.user_agent.clone(),
            "--add-header".to_string(),
            format!("Accept-Language:{}", strategy.accept_language),
        ];

        if let Some(client) = &strategy.player_client {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={client}"));
        }

        if let Some(credential) = attempt.credential {
            args.push("--cookies".to_string());
            args.push(credential.jar_path.to_string_lossy().into_owned());
            if let Some(header) = &credential.header {
                args.push("--add-header".to_string());
                args.push(format!("Cookie:{header}"));
            }
        }

        args
    }
}

#[async_trait]
impl RemoteFetcher for YtDlp {
    async fn fetch(&self, attempt: &FetchAttempt<'_>) -> std::result::Result<PathBuf, ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::build_args(attempt));

        let output = run_tool(cmd, self.timeout).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(PathBuf::from);

        if let Some(path) = printed.filter(|p| p.is_file()) {
            return Ok(path);
        }

        find_downloaded_file(attempt.download_dir)
            .await
            .ok_or_else(|| ToolError::NoOutput {
                program: self.binary.clone(),
            })
    }
}

/// First finished download in `dir`, skipping the tool's partial/temp files.
async fn find_downloaded_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = fs::read_dir(dir).await.ok()?;
    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let partial = path
            .extension()
            .map(|e| matches!(e.to_string_lossy().as_ref(), "part" | "ytdl" | "temp"))
            .unwrap_or(false);
        if !partial && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    found.into_iter().next()
}

/// The single local media file a request resolved to.
#[derive(Debug, Clone)]
pub struct AcquiredSource {
    pub path: PathBuf,
    /// Name of the winning fetch strategy, `None` for uploads.
    pub strategy: Option<String>,
}

pub struct SourceAcquirer {
    fetcher: Arc<dyn RemoteFetcher>,
    strategies: Vec<FetchStrategy>,
}

impl SourceAcquirer {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, strategies: Vec<FetchStrategy>) -> Self {
        Self {
            fetcher,
            strategies,
        }
    }

    pub async fn acquire(
        &self,
        source: &MediaSource,
        workspace: &ScopedWorkspace,
    ) -> Result<AcquiredSource> {
        match source {
            MediaSource::Upload { bytes, filename } => {
                let path = workspace.path().join(upload_file_name(filename));
                fs::write(&path, bytes)
                    .await
                    .map_err(|e| ClipsightError::SourceUnavailable {
                        source_label: filename.clone(),
                        reason: format!("could not store upload: {e}"),
                    })?;
                info!(bytes = bytes.len(), "upload stored");
                Ok(AcquiredSource {
                    path,
                    strategy: None,
                })
            }
            MediaSource::Remote { url, credential } => {
                self.fetch_remote(url, credential.as_ref(), workspace).await
            }
        }
    }

    async fn fetch_remote(
        &self,
        url: &str,
        credential: Option<&Credential>,
        workspace: &ScopedWorkspace,
    ) -> Result<AcquiredSource> {
        let unavailable = |reason: String| ClipsightError::SourceUnavailable {
            source_label: url.to_string(),
            reason,
        };

        let attached = match credential {
            Some(credential) => {
                let jar_path = write_jar_file(workspace.path(), &credential.to_jar(url))
                    .await
                    .map_err(|e| unavailable(format!("could not store cookies: {e}")))?;
                Some(AttachedCredential {
                    jar_path,
                    header: credential.to_header(url),
                })
            }
            None => None,
        };

        let download_dir = workspace.path().join(DOWNLOAD_DIR);
        let mut last_error: Option<ToolError> = None;

        for (position, strategy) in self.strategies.iter().enumerate() {
            reset_dir(&download_dir)
                .await
                .map_err(|e| unavailable(format!("could not prepare download dir: {e}")))?;

            let attempt = FetchAttempt {
                url,
                download_dir: &download_dir,
                strategy,
                credential: attached.as_ref(),
            };

            match self.fetcher.fetch(&attempt).await {
                Ok(path) => {
                    info!(strategy = %strategy.name, attempt = position + 1, "remote source fetched");
                    return Ok(AcquiredSource {
                        path,
                        strategy: Some(strategy.name.clone()),
                    });
                }
                Err(e) => {
                    warn!(strategy = %strategy.name, error = %e, "fetch strategy failed");
                    last_error = Some(e);
                }
            }
        }

        // Leave nothing half-downloaded behind, even before the workspace goes away.
        discard_dir(&download_dir).await;

        Err(match last_error {
            Some(e) => ClipsightError::source_unavailable(url, &e),
            None => unavailable("no fetch strategies configured".to_string()),
        })
    }
}

/// Removes `dir`, logging instead of failing. Returns whether it is gone.
async fn discard_dir(dir: &Path) -> bool {
    match fs::remove_dir_all(dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to remove download directory");
            false
        }
    }
}

async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir).await
}

/// `upload.<ext>`, keeping a short alphanumeric extension from the caller's filename.
pub fn upload_file_name(filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= MAX_EXT_LEN)
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_UPLOAD_EXT.to_string());
    format!("upload.{ext}")
}
