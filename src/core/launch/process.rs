// ─── Game Process ───
// Spawning the JVM, capturing its output and supervising it until exit.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::arguments::CommandLine;
use super::classpath::safe_path_str;
use super::context::{LaunchEvent, LaunchStage, LogStream};
use super::crash::{classify_crash, CrashReport};
use super::natives::cleanup_natives;
use crate::core::error::{LauncherError, LauncherResult};

/// Last `capacity` lines printed by the game. Older lines are evicted.
#[derive(Debug, Clone)]
pub struct LogRingBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// How a game session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub exit_code: Option<i32>,
    pub duration: Duration,
    /// Present for nonzero exits that were not requested through `kill`.
    pub crash: Option<CrashReport>,
    pub killed: bool,
}

/// Handle to a running game. The process is supervised by a background
/// task; dropping the handle does not stop the game.
pub struct GameSession {
    pub id: Uuid,
    pub instance_id: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    logs: LogRingBuffer,
    stop: CancellationToken,
    supervisor: JoinHandle<SessionOutcome>,
}

impl GameSession {
    /// Wait for the game to exit.
    pub async fn wait(self) -> LauncherResult<SessionOutcome> {
        self.supervisor
            .await
            .map_err(|err| LauncherError::Other(format!("Session supervisor failed: {err}")))
    }

    /// Ask the supervisor to terminate the game.
    pub fn kill(&self) {
        info!("Stopping game session {}", self.id);
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.snapshot()
    }
}

pub(crate) struct SpawnPlan<'a> {
    pub session_id: Uuid,
    pub command: &'a CommandLine,
    pub instance_id: &'a str,
    pub game_dir: &'a Path,
    pub natives_dir: &'a Path,
    pub log_capacity: usize,
}

/// Start the game and hand back its session without waiting for it.
pub(crate) fn spawn_game(
    plan: SpawnPlan<'_>,
    events: Option<UnboundedSender<LaunchEvent>>,
) -> LauncherResult<GameSession> {
    let mut cmd = tokio::process::Command::new(&plan.command.program);
    cmd.args(&plan.command.args)
        .current_dir(plan.game_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    configure_native_library_env(&mut cmd, plan.natives_dir);
    configure_platform_spawn(&mut cmd);

    let mut child = cmd.spawn().map_err(|err| {
        LauncherError::ProcessSpawnFailed(format!("{:?}: {}", plan.command.program, err))
    })?;

    let id = plan.session_id;
    let pid = child.id();
    let started_at = Utc::now();
    let started = Instant::now();
    info!(
        "Game process started for {} (pid {:?}, session {})",
        plan.instance_id, pid, id
    );

    let logs = LogRingBuffer::new(plan.log_capacity);
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(pump_lines(
            stdout,
            LogStream::Stdout,
            plan.instance_id.to_string(),
            logs.clone(),
            events.clone(),
        ));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(pump_lines(
            stderr,
            LogStream::Stderr,
            plan.instance_id.to_string(),
            logs.clone(),
            events.clone(),
        ));
    }

    let stop = CancellationToken::new();
    let supervisor = {
        let stop = stop.clone();
        let logs = logs.clone();
        let instance_id = plan.instance_id.to_string();
        let natives_dir = plan.natives_dir.to_path_buf();
        tokio::spawn(async move {
            let (status, killed) = tokio::select! {
                status = child.wait() => (status, false),
                _ = stop.cancelled() => {
                    if let Err(err) = child.kill().await {
                        warn!("Failed to kill game process: {}", err);
                    }
                    (child.wait().await, true)
                }
            };
            for reader in readers {
                let _ = reader.await;
            }
            finish_session(status, killed, started.elapsed(), &instance_id, &natives_dir, &logs, events)
                .await
        })
    };

    Ok(GameSession {
        id,
        instance_id: plan.instance_id.to_string(),
        pid,
        started_at,
        logs,
        stop,
        supervisor,
    })
}

async fn finish_session(
    status: std::io::Result<std::process::ExitStatus>,
    killed: bool,
    duration: Duration,
    instance_id: &str,
    natives_dir: &Path,
    logs: &LogRingBuffer,
    events: Option<UnboundedSender<LaunchEvent>>,
) -> SessionOutcome {
    let (exit_code, success) = match status {
        Ok(status) => (status.code(), status.success()),
        Err(err) => {
            error!("Lost track of the game process for {}: {}", instance_id, err);
            (None, false)
        }
    };

    let crash = if success || killed {
        None
    } else {
        let report = classify_crash(exit_code, &logs.snapshot());
        warn!(
            "Game for {} crashed: {:?} (exit code {:?})",
            instance_id, report.cause, exit_code
        );
        Some(report)
    };

    info!(
        "Game for {} exited with {:?} after {}s",
        instance_id,
        exit_code,
        duration.as_secs()
    );
    cleanup_natives(natives_dir).await;

    if let Some(tx) = &events {
        let _ = tx.send(LaunchEvent::Stage {
            stage: LaunchStage::Exit,
        });
        if let Some(report) = &crash {
            let _ = tx.send(LaunchEvent::Crash {
                report: report.clone(),
            });
        }
        let _ = tx.send(LaunchEvent::Exited {
            exit_code,
            duration_secs: duration.as_secs(),
        });
    }

    SessionOutcome {
        exit_code,
        duration,
        crash,
        killed,
    }
}

fn pump_lines<R>(
    reader: R,
    stream: LogStream,
    instance_id: String,
    logs: LogRingBuffer,
    events: Option<UnboundedSender<LaunchEvent>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!("[mc:{}] output stream error: {}", instance_id, err);
                    break;
                }
            };
            match stream {
                LogStream::Stdout => info!("[mc:{}] {}", instance_id, line),
                LogStream::Stderr => warn!("[mc:{}] {}", instance_id, line),
            }
            if let Some(tx) = &events {
                let _ = tx.send(LaunchEvent::Log {
                    stream,
                    line: line.clone(),
                });
            }
            logs.push(line);
        }
    })
}

// ── Environment ─────────────────────────────────────────

fn configure_native_library_env(cmd: &mut tokio::process::Command, natives_dir: &Path) {
    let native_path = safe_path_str(natives_dir);

    let var = if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    };
    cmd.env(var, append_env_path(var, &native_path));
}

fn configure_platform_spawn(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NEW_CONSOLE: u32 = 0x00000010;
        cmd.creation_flags(CREATE_NEW_CONSOLE);

        // Terminal markers make LWJGL treat the game as a console session.
        cmd.env_remove("WT_SESSION");
        cmd.env_remove("TERM");
        cmd.env_remove("ConEmuANSI");
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::launch::crash::CrashCause;
    use std::path::PathBuf;

    #[test]
    fn ring_buffer_keeps_only_the_newest_lines() {
        let buffer = LogRingBuffer::new(3);
        for i in 0..5 {
            buffer.push(format!("line {i}"));
        }
        assert_eq!(buffer.snapshot(), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(LogRingBuffer::new(0).capacity(), 1);
    }

    #[test]
    fn append_env_path_prefixes_new_value() {
        let merged = append_env_path("IFACE_LAUNCH_UNSET_VAR", "/opt/natives");
        assert_eq!(merged, "/opt/natives");

        std::env::set_var("IFACE_LAUNCH_TEST_PATH", "/usr/lib");
        let merged = append_env_path("IFACE_LAUNCH_TEST_PATH", "/opt/natives");
        let sep = if cfg!(target_os = "windows") { ";" } else { ":" };
        assert_eq!(merged, format!("/opt/natives{sep}/usr/lib"));
        std::env::remove_var("IFACE_LAUNCH_TEST_PATH");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let temp = tempfile::tempdir().unwrap();
        let command = CommandLine {
            program: temp.path().join("no-such-java"),
            args: Vec::new(),
        };
        let result = spawn_game(
            SpawnPlan {
                session_id: Uuid::new_v4(),
                command: &command,
                instance_id: "test",
                game_dir: temp.path(),
                natives_dir: &temp.path().join("natives"),
                log_capacity: 10,
            },
            None,
        );
        assert!(matches!(result, Err(LauncherError::ProcessSpawnFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn crashed_process_is_classified_from_captured_output() {
        let temp = tempfile::tempdir().unwrap();
        let natives = temp.path().join("natives");
        std::fs::create_dir_all(&natives).unwrap();
        let command = CommandLine {
            program: PathBuf::from("/bin/sh"),
            args: vec![
                "-c".into(),
                "echo 'Loading'; echo 'java.lang.OutOfMemoryError: Java heap space' >&2; exit 1"
                    .into(),
            ],
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let session = spawn_game(
            SpawnPlan {
                session_id: Uuid::new_v4(),
                command: &command,
                instance_id: "test",
                game_dir: temp.path(),
                natives_dir: &natives,
                log_capacity: 100,
            },
            Some(tx),
        )
        .unwrap();
        let outcome = session.wait().await.unwrap();

        assert_eq!(outcome.exit_code, Some(1));
        assert!(!outcome.killed);
        assert_eq!(outcome.crash.unwrap().cause, CrashCause::OutOfMemory);
        assert!(!natives.exists());

        let mut saw_exit = false;
        while let Ok(event) = rx.try_recv() {
            if let LaunchEvent::Exited { exit_code, .. } = event {
                assert_eq!(exit_code, Some(1));
                saw_exit = true;
            }
        }
        assert!(saw_exit);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn killed_session_reports_no_crash() {
        let temp = tempfile::tempdir().unwrap();
        let command = CommandLine {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "exec sleep 30".into()],
        };
        let session = spawn_game(
            SpawnPlan {
                session_id: Uuid::new_v4(),
                command: &command,
                instance_id: "test",
                game_dir: temp.path(),
                natives_dir: &temp.path().join("natives"),
                log_capacity: 10,
            },
            None,
        )
        .unwrap();
        assert!(session.pid.is_some());

        session.kill();
        let outcome = session.wait().await.unwrap();
        assert!(outcome.killed);
        assert!(outcome.crash.is_none());
    }
}
