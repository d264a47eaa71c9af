use std::fmt;
use std::path::Path;

/// Host operating system family. Anything that is not Windows or macOS is
/// treated as Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Linux,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }
}

/// A concrete external process to run: program name plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Lock,
    Sleep,
    Shutdown,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChord {
    PlayPause,
    NextTrack,
    PreviousTrack,
    VolumeUp,
    VolumeDown,
    Mute,
    Copy,
    Paste,
}

/// Invocations for a power-state transition, run in order.
pub fn power_invocations(platform: Platform, action: PowerAction) -> Vec<Invocation> {
    match (action, platform) {
        (PowerAction::Lock, Platform::Windows) => {
            vec![Invocation::new("rundll32.exe", ["user32.dll,LockWorkStation"])]
        }
        (PowerAction::Lock, Platform::MacOs) => vec![Invocation::new("pmset", ["displaysleepnow"])],
        (PowerAction::Lock, Platform::Linux) => {
            vec![Invocation::new("gnome-screensaver-command", ["--lock"])]
        }
        (PowerAction::Sleep, Platform::Windows) => vec![
            // Hibernation must be off or SetSuspendState hibernates instead
            Invocation::new("powercfg", ["/hibernate", "off"]),
            Invocation::new("rundll32.exe", ["powrprof.dll,SetSuspendState", "0,1,0"]),
        ],
        (PowerAction::Sleep, Platform::MacOs) => vec![Invocation::new("pmset", ["sleepnow"])],
        (PowerAction::Sleep, Platform::Linux) => vec![Invocation::new("systemctl", ["suspend"])],
        (PowerAction::Shutdown, Platform::Windows) => {
            vec![Invocation::new("shutdown", ["/s", "/t", "0"])]
        }
        (PowerAction::Shutdown, _) => vec![Invocation::new("sudo", ["shutdown", "-h", "now"])],
        (PowerAction::Restart, Platform::Windows) => {
            vec![Invocation::new("shutdown", ["/r", "/t", "0"])]
        }
        (PowerAction::Restart, _) => vec![Invocation::new("sudo", ["shutdown", "-r", "now"])],
    }
}

/// Map a spoken application name to the platform's launcher token.
/// Unknown names pass through untouched.
pub fn app_token(platform: Platform, app: &str) -> String {
    let token = match (app, platform) {
        ("chrome", Platform::Windows) => "chrome",
        ("chrome", Platform::MacOs) => "Google Chrome",
        ("chrome", Platform::Linux) => "google-chrome",
        ("firefox", Platform::MacOs) => "Firefox",
        ("firefox", _) => "firefox",
        ("safari", Platform::MacOs) => "Safari",
        ("safari", _) => "safari",
        ("edge", Platform::Windows) => "msedge",
        ("edge", Platform::MacOs) => "Microsoft Edge",
        ("edge", Platform::Linux) => "microsoft-edge",
        ("spotify" | "music", Platform::MacOs) => "Spotify",
        ("spotify" | "music", _) => "spotify",
        ("terminal", Platform::Windows) => "cmd",
        ("terminal", Platform::MacOs) => "Terminal",
        ("terminal", Platform::Linux) => "gnome-terminal",
        ("calculator", Platform::Windows) => "calc",
        ("calculator", Platform::MacOs) => "Calculator",
        ("calculator", Platform::Linux) => "gnome-calculator",
        ("notepad", Platform::Windows) => "notepad",
        ("notepad", Platform::MacOs) => "TextEdit",
        ("notepad", Platform::Linux) => "gedit",
        ("finder" | "explorer", Platform::Windows) => "explorer",
        ("finder" | "explorer", Platform::MacOs) => "Finder",
        ("finder" | "explorer", Platform::Linux) => "nautilus",
        _ => app,
    };
    token.to_string()
}

pub fn launch_invocation(platform: Platform, app: &str) -> Invocation {
    let token = app_token(platform, app);
    match platform {
        // Empty title argument so `start` does not treat a quoted name as the title
        Platform::Windows => Invocation::new("cmd", ["/C", "start", "", token.as_str()]),
        Platform::MacOs => Invocation::new("open", ["-a", token.as_str()]),
        Platform::Linux => Invocation::new(&token, Vec::<String>::new()),
    }
}

pub fn shell_invocation(platform: Platform, line: &str) -> Invocation {
    match platform {
        Platform::Windows => Invocation::new("cmd", ["/C", line]),
        _ => Invocation::new("sh", ["-c", line]),
    }
}

pub fn key_invocation(platform: Platform, chord: KeyChord) -> Invocation {
    match platform {
        Platform::Linux => {
            let keysym = match chord {
                KeyChord::PlayPause => "XF86AudioPlay",
                KeyChord::NextTrack => "XF86AudioNext",
                KeyChord::PreviousTrack => "XF86AudioPrev",
                KeyChord::VolumeUp => "XF86AudioRaiseVolume",
                KeyChord::VolumeDown => "XF86AudioLowerVolume",
                KeyChord::Mute => "XF86AudioMute",
                KeyChord::Copy => "ctrl+c",
                KeyChord::Paste => "ctrl+v",
            };
            Invocation::new("xdotool", ["key", keysym])
        }
        Platform::MacOs => {
            let script = match chord {
                KeyChord::PlayPause => r#"tell application "Music" to playpause"#,
                KeyChord::NextTrack => r#"tell application "Music" to next track"#,
                KeyChord::PreviousTrack => r#"tell application "Music" to previous track"#,
                KeyChord::VolumeUp => {
                    "set volume output volume ((output volume of (get volume settings)) + 6)"
                }
                KeyChord::VolumeDown => {
                    "set volume output volume ((output volume of (get volume settings)) - 6)"
                }
                KeyChord::Mute => "set volume output muted not (output muted of (get volume settings))",
                KeyChord::Copy => {
                    r#"tell application "System Events" to keystroke "c" using command down"#
                }
                KeyChord::Paste => {
                    r#"tell application "System Events" to keystroke "v" using command down"#
                }
            };
            Invocation::new("osascript", ["-e", script])
        }
        Platform::Windows => {
            let keys = match chord {
                KeyChord::PlayPause => "[char]179",
                KeyChord::NextTrack => "[char]176",
                KeyChord::PreviousTrack => "[char]177",
                KeyChord::VolumeUp => "[char]175",
                KeyChord::VolumeDown => "[char]174",
                KeyChord::Mute => "[char]173",
                KeyChord::Copy => "'^c'",
                KeyChord::Paste => "'^v'",
            };
            let script = format!("(New-Object -ComObject WScript.Shell).SendKeys({})", keys);
            Invocation::new("powershell", ["-NoProfile", "-Command", script.as_str()])
        }
    }
}

/// Screen capture to `path`. `has_grim` selects the Wayland tool over ImageMagick on Linux.
pub fn screenshot_invocation(platform: Platform, path: &Path, has_grim: bool) -> Invocation {
    let target = path.display().to_string();
    match platform {
        Platform::Linux if has_grim => Invocation::new("grim", [target]),
        Platform::Linux => Invocation::new("import", ["-window".to_string(), "root".to_string(), target]),
        Platform::MacOs => Invocation::new("screencapture", ["-x".to_string(), target]),
        Platform::Windows => {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
                 $b = [System.Windows.Forms.SystemInformation]::VirtualScreen; \
                 $bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height; \
                 $g = [System.Drawing.Graphics]::FromImage($bmp); \
                 $g.CopyFromScreen($b.Left, $b.Top, 0, 0, $bmp.Size); \
                 $bmp.Save('{}', [System.Drawing.Imaging.ImageFormat]::Png)",
                target.replace('\'', "''")
            );
            Invocation::new("powershell", ["-NoProfile".to_string(), "-Command".to_string(), script])
        }
    }
}

pub fn command_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
        .unwrap_or(false)
}
