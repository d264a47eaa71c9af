use crate::automation::{Automation, Telemetry};
use crate::platform::{self, Platform};
use crate::resolver::{Action, Builtin};
use crate::storage::ExecutionResult;
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(30);
const TIMED_OUT: &str = "Command timed out";

pub struct CommandExecutor {
    platform: Platform,
    automation: Arc<dyn Automation>,
    shell_timeout: Duration,
    screenshot_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(platform: Platform, automation: Arc<dyn Automation>) -> Self {
        Self {
            platform,
            automation,
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }

    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: PathBuf) -> Self {
        self.screenshot_dir = dir;
        self
    }

    /// Run an action. Faults never escape; they come back as a failed result.
    pub async fn execute(&self, action: &Action) -> ExecutionResult {
        match action {
            Action::ShellAlias { phrase, invocation } => {
                info!(alias = %phrase, command = %invocation, "executing custom command");
                self.run_shell(phrase, invocation).await
            }
            Action::RawShell(line) => self.run_shell(line, line).await,
            Action::Builtin(builtin) => {
                contain(builtin.label(), self.run_builtin(*builtin).await)
            }
            Action::OpenApp(app) => contain(&format!("open {}", app), self.open_app(app)),
            Action::CloseApp(app) => {
                contain(&format!("close {}", app), self.close_app(app).await)
            }
        }
    }

    /// Exit code 0 is a success even with stderr output. That stderr is
    /// appended after stdout so `error` stays empty.
    async fn run_shell(&self, label: &str, line: &str) -> ExecutionResult {
        let invocation = platform::shell_invocation(self.platform, line);
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait on timeout must not leave the child running
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => return ExecutionResult::failure(label, format!("Failed to spawn shell: {}", e)),
        };

        let output = match tokio::time::timeout(self.shell_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ExecutionResult::failure(label, format!("Failed to wait for shell: {}", e)),
            Err(_) => return ExecutionResult::failure(label, TIMED_OUT),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!(command = %line, status = ?output.status.code(), "shell finished");

        if output.status.success() {
            // Diagnostics from a successful command stay visible without marking it failed
            let mut combined = stdout;
            combined.push_str(&stderr);
            ExecutionResult::success(label, combined)
        } else if stderr.is_empty() {
            let status = output
                .status
                .code()
                .map(|c| format!("Command exited with status {}", c))
                .unwrap_or_else(|| "Command terminated by signal".to_string());
            ExecutionResult::failure_with_output(label, stdout, status)
        } else {
            ExecutionResult::failure_with_output(label, stdout, stderr)
        }
    }

    async fn run_builtin(&self, builtin: Builtin) -> Result<String> {
        if let Some(action) = builtin.power_action() {
            for invocation in platform::power_invocations(self.platform, action) {
                self.automation.run(&invocation).await?;
            }
        } else if let Some(chord) = builtin.key_chord() {
            self.automation.send_keys(chord).await?;
        }

        let output = match builtin {
            Builtin::Lock => "Computer locked successfully".to_string(),
            Builtin::Sleep => "Computer put to sleep".to_string(),
            Builtin::Shutdown => "Computer shutting down".to_string(),
            Builtin::Restart => "Computer restarting".to_string(),
            Builtin::PlayPause => "Media play/pause toggled".to_string(),
            Builtin::NextTrack => "Next track".to_string(),
            Builtin::PreviousTrack => "Previous track".to_string(),
            Builtin::VolumeUp => "Volume increased".to_string(),
            Builtin::VolumeDown => "Volume decreased".to_string(),
            Builtin::Mute => "Volume muted/unmuted".to_string(),
            Builtin::Copy => "Copied to clipboard".to_string(),
            Builtin::Paste => "Pasted from clipboard".to_string(),
            Builtin::Screenshot => self.take_screenshot().await?,
            Builtin::SystemInfo => self.system_info().await?,
        };
        Ok(output)
    }

    fn open_app(&self, app: &str) -> Result<String> {
        let invocation = platform::launch_invocation(self.platform, app);
        self.automation.launch(&invocation)?;
        Ok(format!("Opened {}", app))
    }

    /// Terminates every process whose name contains `app`, case-insensitively.
    /// The match is deliberately loose (`code` also hits `codecs-helper`).
    /// Matching nothing still counts as success.
    async fn close_app(&self, app: &str) -> Result<String> {
        let needle = app.to_lowercase();
        let processes = self
            .automation
            .processes()
            .await
            .context("Failed to enumerate processes")?;
        let mut closed = 0usize;
        for process in processes
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
        {
            self.automation.kill(process.pid).await?;
            closed += 1;
        }
        debug!(app = %app, closed, "close finished");
        Ok(format!("Closed {}", app))
    }

    async fn take_screenshot(&self) -> Result<String> {
        let filename = format!("screenshot_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.screenshot_dir.join(filename);
        self.automation.capture_screen(&path).await?;
        Ok(format!("Screenshot saved: {}", path.display()))
    }

    async fn system_info(&self) -> Result<String> {
        let telemetry = self.automation.telemetry().await?;
        format_system_info(&telemetry, self.platform)
    }
}

fn contain(label: &str, outcome: Result<String>) -> ExecutionResult {
    match outcome {
        Ok(output) => ExecutionResult::success(label, output),
        Err(e) => ExecutionResult::failure(label, format!("{:#}", e)),
    }
}

fn format_system_info(telemetry: &Telemetry, platform: Platform) -> Result<String> {
    let uptime = Utc::now().signed_duration_since(telemetry.boot_time);
    let info = serde_json::json!({
        "cpu_usage": format!("{}%", telemetry.cpu_percent),
        "memory_usage": format!("{}%", telemetry.memory_percent),
        "disk_usage": format!("{}%", telemetry.disk_percent),
        "platform": platform.name(),
        "uptime": format_uptime(uptime.num_seconds()),
    });
    serde_json::to_string_pretty(&info).context("Failed to encode system info")
}

/// `"2 days, 3:04:05"` style, matching how elapsed time reads on most hosts.
fn format_uptime(total_secs: i64) -> String {
    let total = total_secs.max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let clock = format!("{}:{:02}:{:02}", hours, minutes, seconds);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}
