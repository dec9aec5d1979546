use std::{
    process::{Output, Stdio},
    time::Duration,
};

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::debug;

/// Failure of a single external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} finished but produced no output file")]
    NoOutput { program: String },
}

/// Kills the child's whole process group on drop unless disarmed.
///
/// yt-dlp hands merging off to its own ffmpeg child, which `kill_on_drop`
/// alone would leave running against the workspace.
struct GroupKill {
    pgid: Option<i32>,
}

impl GroupKill {
    fn arm(child: &Child) -> Self {
        let pgid = if cfg!(unix) {
            child.id().and_then(|id| i32::try_from(id).ok())
        } else {
            None
        };
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: killpg only sends a signal; a group that already exited yields ESRCH.
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            debug!(pgid, killed = rc == 0, "terminated tool process group");
        }
    }
}

/// Runs `cmd` to completion, bounded by `timeout`.
///
/// The child and everything it spawned are killed if the timeout fires or the
/// returned future is dropped.
pub async fn run_tool(mut cmd: Command, timeout: Duration) -> Result<Output, ToolError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    // arguments can carry cookie headers, so only the program is logged
    debug!(%program, "spawning external tool");

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => return Err(ToolError::Spawn { program, source }),
    };
    let mut group = GroupKill::arm(&child);

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(ToolError::Spawn { program, source }),
        Err(_) => return Err(ToolError::TimedOut { program, timeout }),
    };
    group.disarm();

    if !output.status.success() {
        return Err(ToolError::Failed {
            program,
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        });
    }

    Ok(output)
}

// ffmpeg and yt-dlp put the actual reason on the last lines.
fn stderr_tail(stderr: &[u8]) -> String {
    const MAX_LINES: usize = 3;

    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr = b"line one\n\nline two\nline three\nERROR: no formats\n";
        assert_eq!(
            stderr_tail(stderr),
            "line two | line three | ERROR: no formats"
        );
    }

    #[test]
    fn stderr_tail_of_empty_output() {
        assert_eq!(stderr_tail(b""), "");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let cmd = Command::new("clipsight-definitely-not-installed");
        let err = run_tool(cmd, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'bad input' >&2; exit 3");
        let err = run_tool(cmd, Duration::from_secs(5)).await.unwrap_err();
        match err {
            ToolError::Failed { stderr, .. } => assert_eq!(stderr, "bad input"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_tool(cmd, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }), "{err:?}");
        assert_eq!(err.to_string(), "sleep timed out after 100ms");
    }

    // A reaped pid has no /proc entry; an unreaped one shows state `Z`.
    #[cfg(target_os = "linux")]
    fn is_gone(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_spawned_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("sleep 30 & echo $! > '{}'; wait", pid_file.display()));
        let err = run_tool(cmd, Duration::from_millis(300)).await.unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }), "{err:?}");

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let mut gone = false;
        for _ in 0..40 {
            if is_gone(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "grandchild {pid} survived the timeout");
    }
}
