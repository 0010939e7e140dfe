use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::types::{CompletionOptions, Message};
use crate::{CompletionError, Result};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude --output-format stream-json --input-format stream-json`
/// subprocess.
///
/// The prompt goes in as a single user message on stdin, after which stdin is
/// closed. Responses are read as JSONL from stdout. Stderr is drained by a
/// background task and surfaced on non-zero exit.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    stderr_buf: Arc<Mutex<String>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl ClaudeProcess {
    /// Spawn `executable` and send `prompt` as the only user message.
    pub(crate) async fn spawn(
        executable: &str,
        cwd: Option<&PathBuf>,
        prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<Self> {
        let mut cmd = build_command(executable, opts);
        // Allow running from inside an existing Claude session.
        cmd.env_remove("CLAUDECODE");
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut process = Self::from_command(cmd)?;

        let user_msg = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt}]
            }
        });
        process.send_message(&user_msg).await?;
        process.close_stdin();

        Ok(process)
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(CompletionError::Io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CompletionError::Process("stdout not captured".into()))?;

        let stdin = child.stdin.take();

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let mut stderr_task = None;
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            stderr_task = Some(tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            }));
        }

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stdin,
            stderr_buf,
            stderr_task,
        })
    }

    async fn send_message(&mut self, msg: &serde_json::Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CompletionError::Process("stdin already closed".into()))?;

        let mut buf = serde_json::to_vec(msg).map_err(|e| {
            CompletionError::Process(format!("failed to serialize stdin message: {e}"))
        })?;
        buf.push(b'\n');

        // A child that exits before reading stdin closes the pipe; the exit
        // status carries the real error, so a broken pipe is not fatal here.
        if let Err(e) = stdin.write_all(&buf).await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(CompletionError::Io(e));
            }
        }
        let _ = stdin.flush().await;
        Ok(())
    }

    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Read the next non-empty JSONL line and deserialize it.
    ///
    /// Lines that are valid JSON with an unrecognised `type` (e.g.
    /// `rate_limit_event`, `tool_progress`) are skipped. `Ok(None)` on EOF.
    pub(crate) async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            match self.lines.next_line().await {
                Err(e) => return Err(CompletionError::Io(e)),
                Ok(None) => return Ok(None),
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Message>(trimmed) {
                        Ok(msg) => return Ok(Some(msg)),
                        Err(e) => {
                            if is_unknown_message_type(trimmed) {
                                continue;
                            }
                            return Err(CompletionError::Parse {
                                line: trimmed.to_owned(),
                                source: e,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Wait for the child and describe a non-zero exit, including stderr.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<String> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(e.to_string()),
        };

        if status.success() {
            return None;
        }

        // The pipe is closed once the child exits; let the reader finish.
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let head = match status.code() {
            Some(code) => format!("claude process exited with code {code}"),
            None => "claude process terminated by signal".to_string(),
        };
        if stderr.is_empty() {
            Some(head)
        } else {
            Some(format!("{head}\nstderr: {stderr}"))
        }
    }

    /// Best-effort kill; errors are ignored.
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// Valid JSON with a `"type"` field is an unknown message type, not a
/// protocol error.
fn is_unknown_message_type(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .map(|v| v.get("type").is_some())
        .unwrap_or(false)
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(executable: &str, opts: &CompletionOptions) -> Command {
    let mut cmd = Command::new(executable);

    cmd.arg("--print")
        .arg("--output-format")
        .arg("stream-json")
        .arg("--verbose")
        .arg("--input-format")
        .arg("stream-json")
        .arg("--no-session-persistence");

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }

    cmd.arg("--max-turns")
        .arg(opts.max_turns.unwrap_or(1).to_string());

    if let Some(sp) = &opts.system_prompt {
        cmd.arg("--system-prompt").arg(sp);
    }

    cmd
}
