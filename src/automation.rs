use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::process::Stdio;
use sysinfo::{Disks, Pid, ProcessRefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::process::Command;
use tracing::debug;

use crate::platform::{self, Invocation, KeyChord, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub boot_time: DateTime<Utc>,
}

/// Every host side effect a built-in action needs.
#[async_trait]
pub trait Automation: Send + Sync {
    /// Run to completion. The exit status is not inspected.
    async fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Start and detach without waiting. Call from inside the runtime.
    fn launch(&self, invocation: &Invocation) -> Result<()>;

    async fn send_keys(&self, chord: KeyChord) -> Result<()>;

    async fn processes(&self) -> Result<Vec<ProcessEntry>>;

    async fn kill(&self, pid: u32) -> Result<()>;

    async fn capture_screen(&self, path: &Path) -> Result<()>;

    async fn telemetry(&self) -> Result<Telemetry>;
}

pub struct HostAutomation {
    platform: Platform,
    system: Mutex<System>,
}

impl HostAutomation {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            system: Mutex::new(System::new()),
        }
    }

    fn disk_percent() -> Result<f32> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| disks.iter().next())
            .ok_or_else(|| anyhow!("No disks found"))?;
        let total = disk.total_space();
        if total == 0 {
            bail!("Disk {} reports zero capacity", disk.mount_point().display());
        }
        let used = total.saturating_sub(disk.available_space());
        Ok(percent(used, total))
    }
}

/// Linux caps the kernel process name at 15 bytes. When a name hits that cap,
/// the executable's file name is used instead if it extends the short name.
fn full_name(name: &str, argv0: Option<&str>, exe: Option<&Path>) -> String {
    const COMM_LEN: usize = 15;
    if name.len() < COMM_LEN {
        return name.to_string();
    }
    let argv0 = argv0.and_then(|arg| Path::new(arg).file_name());
    let exe = exe.and_then(Path::file_name);
    argv0
        .into_iter()
        .chain(exe)
        .filter_map(|candidate| candidate.to_str())
        .find(|candidate| candidate.len() > name.len() && candidate.starts_with(name))
        .unwrap_or(name)
        .to_string()
}

fn percent(part: u64, whole: u64) -> f32 {
    let value = part as f64 / whole as f64 * 100.0;
    ((value * 10.0).round() / 10.0) as f32
}

#[async_trait]
impl Automation for HostAutomation {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        debug!(%invocation, "running");
        Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to run {}", invocation.program))?;
        Ok(())
    }

    fn launch(&self, invocation: &Invocation) -> Result<()> {
        debug!(%invocation, "launching");
        // The runtime reaps a dropped child once it exits
        Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch {}", invocation.program))?;
        Ok(())
    }

    async fn send_keys(&self, chord: KeyChord) -> Result<()> {
        self.run(&platform::key_invocation(self.platform, chord)).await
    }

    async fn processes(&self) -> Result<Vec<ProcessEntry>> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(ProcessRefreshKind::everything());
        Ok(system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: full_name(
                    process.name(),
                    process.cmd().first().map(String::as_str),
                    process.exe(),
                ),
            })
            .collect())
    }

    async fn kill(&self, pid: u32) -> Result<()> {
        let system = self.system.lock();
        // Already gone is fine
        let Some(process) = system.process(Pid::from_u32(pid)) else {
            return Ok(());
        };
        if !process.kill() {
            bail!("Failed to terminate process {} ({})", process.name(), pid);
        }
        Ok(())
    }

    async fn capture_screen(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let has_grim = self.platform == Platform::Linux && platform::command_exists("grim");
        let invocation = platform::screenshot_invocation(self.platform, path, has_grim);
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", invocation.program))?;
        if !output.status.success() {
            bail!(
                "{} failed: {}",
                invocation.program,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn telemetry(&self) -> Result<Telemetry> {
        self.system.lock().refresh_cpu();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL.max(std::time::Duration::from_secs(1)))
            .await;
        let (cpu_percent, memory_percent) = {
            let mut system = self.system.lock();
            system.refresh_cpu();
            system.refresh_memory();
            let total = system.total_memory();
            if total == 0 {
                bail!("Total memory reported as zero");
            }
            (
                system.global_cpu_info().cpu_usage(),
                percent(system.used_memory(), total),
            )
        };
        let disk_percent = Self::disk_percent()?;
        let boot_secs = i64::try_from(System::boot_time()).context("Boot time out of range")?;
        let boot_time = DateTime::<Utc>::from_timestamp(boot_secs, 0)
            .ok_or_else(|| anyhow!("Invalid boot time {}", boot_secs))?;
        Ok(Telemetry {
            cpu_percent,
            memory_percent,
            disk_percent,
            boot_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(50, 100), 50.0);
    }

    #[tokio::test]
    async fn lists_current_process() {
        let host = HostAutomation::new(Platform::current());
        let processes = host.processes().await.unwrap();
        let me = std::process::id();
        assert!(processes.iter().any(|p| p.pid == me));
    }

    #[test]
    fn truncated_name_takes_executable_name() {
        let exe = Path::new("/usr/bin/gnome-calculator");
        assert_eq!(
            full_name("gnome-calculat", Some("gnome-calculator"), Some(exe)),
            "gnome-calculat"
        );
        assert_eq!(
            full_name("gnome-calculato", Some("/usr/bin/gnome-calculator"), None),
            "gnome-calculator"
        );
        assert_eq!(full_name("gnome-calculato", None, Some(exe)), "gnome-calculator");
        // Unrelated argv0 (for example a renamed interpreter) keeps the short name
        assert_eq!(
            full_name("gnome-calculato", Some("python3"), None),
            "gnome-calculato"
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn lists_long_names_untruncated() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = dir.path().join("aurex-long-process-name");
        std::fs::copy("/bin/sleep", &program).unwrap();
        let mut child = std::process::Command::new(&program).arg("5").spawn().unwrap();

        let host = HostAutomation::new(Platform::Linux);
        let processes = host.processes().await.unwrap();
        let entry = processes.iter().find(|p| p.pid == child.id()).cloned();

        child.kill().unwrap();
        child.wait().unwrap();
        assert_eq!(entry.unwrap().name, "aurex-long-process-name");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn launched_children_are_reaped() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = dir.path().join("aurex-launched");
        std::fs::copy("/bin/true", &program).unwrap();

        let host = HostAutomation::new(Platform::Linux);
        let invocation = Invocation::new(&program.to_string_lossy(), Vec::<String>::new());
        for _ in 0..3 {
            host.launch(&invocation).unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        assert_eq!(zombie_children_named("aurex-launched"), 0);
    }

    #[cfg(target_os = "linux")]
    fn zombie_children_named(comm: &str) -> usize {
        let me = std::process::id().to_string();
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                // pid (comm) state ppid ...
                let Some(open) = stat.find('(') else { return false };
                let Some(close) = stat.rfind(')') else { return false };
                let fields: Vec<&str> = stat[close + 1..].split_whitespace().collect();
                &stat[open + 1..close] == comm
                    && fields.first() == Some(&"Z")
                    && fields.get(1) == Some(&me.as_str())
            })
            .count()
    }

    #[tokio::test]
    async fn killing_missing_pid_is_not_an_error() {
        let host = HostAutomation::new(Platform::current());
        assert!(host.kill(u32::MAX - 1).await.is_ok());
    }
}
