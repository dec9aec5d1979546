use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use clipsight_core::{
    Analyzer, FetchStrategy, ProbeResult, SamplingParams,
    frames::FrameExtractor,
    probe::DurationProbe,
    process::ToolError,
    source::{FetchAttempt, RemoteFetcher},
};
use clipsight_server::{AppState, build_router};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

struct UnreachableRemote;

#[async_trait]
impl RemoteFetcher for UnreachableRemote {
    async fn fetch(&self, _attempt: &FetchAttempt<'_>) -> Result<PathBuf, ToolError> {
        Err(ToolError::Failed {
            program: "yt-dlp".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "ERROR: Sign in to confirm your age".to_string(),
        })
    }
}

struct ThirtySeconds;

#[async_trait]
impl DurationProbe for ThirtySeconds {
    async fn probe(&self, _media: &Path) -> ProbeResult {
        ProbeResult {
            duration_seconds: 30.0,
        }
    }
}

struct ThreeFrames;

#[async_trait]
impl FrameExtractor for ThreeFrames {
    async fn extract(
        &self,
        _media: &Path,
        _params: &SamplingParams,
        out_dir: &Path,
    ) -> Result<(), ToolError> {
        for n in 1..=3 {
            std::fs::write(out_dir.join(format!("f_{n:06}.jpg")), b"jpeg").unwrap();
        }
        Ok(())
    }
}

struct TestServer {
    base: String,
    scratch: tempfile::TempDir,
}

async fn spawn_server() -> TestServer {
    let scratch = tempfile::tempdir().unwrap();
    let analyzer = Analyzer::with_tools(
        scratch.path().to_path_buf(),
        Arc::new(UnreachableRemote),
        FetchStrategy::default_chain(),
        Arc::new(ThirtySeconds),
        Arc::new(ThreeFrames),
    );
    let app = build_router(AppState::new(analyzer), 8 * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        scratch,
    }
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn health_is_ok() {
    let server = spawn_server().await;
    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn upload_returns_frames_and_transcript() {
    let server = spawn_server().await;
    let form = Form::new()
        .part(
            "video",
            Part::bytes(b"fake video".to_vec()).file_name("clip.mp4"),
        )
        .text(
            "subtitle",
            "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:04,000 --> 00:00:05,000\nWorld",
        )
        .text("frame_interval_seconds", "10")
        .text("max_frames", "6");

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["meta"]["title"], "clip.mp4");
    assert_eq!(body["meta"]["duration_seconds"], 30.0);
    assert_eq!(body["notes"], "source=upload; subs=provided; cookies=none");

    let thumbs = body["thumbs"].as_array().unwrap();
    let stamps: Vec<f64> = thumbs
        .iter()
        .map(|t| t["timestamp_seconds"].as_f64().unwrap())
        .collect();
    assert_eq!(stamps, [0.0, 10.0, 20.0]);
    assert_eq!(thumbs[0]["image_base64"], "anBlZw==");
    assert_eq!(thumbs[0]["mime_type"], "image/jpeg");

    let transcript = body["transcript"].as_array().unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0]["start_mark"], "00:00:01,000");
    assert_eq!(transcript[1]["text"], "World");

    assert!(scratch_is_empty(server.scratch.path()));
}

#[tokio::test]
async fn missing_source_is_a_client_error() {
    let server = spawn_server().await;
    let form = Form::new().text("max_frames", "3");

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("video file or a url"));
}

#[tokio::test]
async fn bad_sampling_is_a_client_error() {
    let server = spawn_server().await;
    let form = Form::new()
        .part("video", Part::bytes(b"x".to_vec()).file_name("clip.mp4"))
        .text("frame_interval_seconds", "0");

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unreachable_remote_is_a_server_error_without_paths() {
    let server = spawn_server().await;
    let form = Form::new()
        .text("url", "https://www.youtube.com/watch?v=restricted")
        .text("cookies", "SID=abc; HSID=def");

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Source unavailable"), "{message}");
    assert!(message.contains("Sign in to confirm your age"), "{message}");
    assert!(
        !message.contains(&*server.scratch.path().to_string_lossy()),
        "{message}"
    );
    assert!(scratch_is_empty(server.scratch.path()));
}
