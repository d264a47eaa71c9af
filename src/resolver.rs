use std::collections::HashMap;

use crate::platform::{KeyChord, PowerAction};

/// Fixed set of host actions that run without shell passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Lock,
    Sleep,
    Shutdown,
    Restart,
    PlayPause,
    NextTrack,
    PreviousTrack,
    VolumeUp,
    VolumeDown,
    Mute,
    Screenshot,
    Copy,
    Paste,
    SystemInfo,
}

impl Builtin {
    pub const ALL: [Builtin; 14] = [
        Builtin::Lock,
        Builtin::Sleep,
        Builtin::Shutdown,
        Builtin::Restart,
        Builtin::PlayPause,
        Builtin::NextTrack,
        Builtin::PreviousTrack,
        Builtin::VolumeUp,
        Builtin::VolumeDown,
        Builtin::Mute,
        Builtin::Screenshot,
        Builtin::Copy,
        Builtin::Paste,
        Builtin::SystemInfo,
    ];

    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Builtin::Lock => &["lock", "lock computer", "lock screen"],
            Builtin::Sleep => &["sleep", "suspend"],
            Builtin::Shutdown => &["shutdown", "turn off", "power off"],
            Builtin::Restart => &["restart", "reboot"],
            Builtin::PlayPause => &["play", "pause", "play/pause"],
            Builtin::NextTrack => &["next", "next track"],
            Builtin::PreviousTrack => &["previous", "previous track"],
            Builtin::VolumeUp => &["volume up", "increase volume"],
            Builtin::VolumeDown => &["volume down", "decrease volume"],
            Builtin::Mute => &["mute", "unmute"],
            Builtin::Screenshot => &["screenshot", "take screenshot", "capture screen"],
            Builtin::Copy => &["copy", "copy to clipboard"],
            Builtin::Paste => &["paste", "paste from clipboard"],
            Builtin::SystemInfo => &["system info", "system status", "status"],
        }
    }

    /// Label reported in the result's `command` field.
    pub fn label(&self) -> &'static str {
        match self {
            Builtin::Lock => "lock computer",
            Builtin::Sleep => "sleep",
            Builtin::Shutdown => "shutdown",
            Builtin::Restart => "restart",
            Builtin::PlayPause => "play/pause",
            Builtin::NextTrack => "next track",
            Builtin::PreviousTrack => "previous track",
            Builtin::VolumeUp => "volume up",
            Builtin::VolumeDown => "volume down",
            Builtin::Mute => "mute",
            Builtin::Screenshot => "screenshot",
            Builtin::Copy => "copy",
            Builtin::Paste => "paste",
            Builtin::SystemInfo => "system info",
        }
    }

    pub fn power_action(&self) -> Option<PowerAction> {
        match self {
            Builtin::Lock => Some(PowerAction::Lock),
            Builtin::Sleep => Some(PowerAction::Sleep),
            Builtin::Shutdown => Some(PowerAction::Shutdown),
            Builtin::Restart => Some(PowerAction::Restart),
            _ => None,
        }
    }

    pub fn key_chord(&self) -> Option<KeyChord> {
        match self {
            Builtin::PlayPause => Some(KeyChord::PlayPause),
            Builtin::NextTrack => Some(KeyChord::NextTrack),
            Builtin::PreviousTrack => Some(KeyChord::PreviousTrack),
            Builtin::VolumeUp => Some(KeyChord::VolumeUp),
            Builtin::VolumeDown => Some(KeyChord::VolumeDown),
            Builtin::Mute => Some(KeyChord::Mute),
            Builtin::Copy => Some(KeyChord::Copy),
            Builtin::Paste => Some(KeyChord::Paste),
            _ => None,
        }
    }

    fn lookup(text: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.synonyms().contains(&text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Operator-configured phrase mapped to a shell line.
    ShellAlias { phrase: String, invocation: String },
    Builtin(Builtin),
    OpenApp(String),
    CloseApp(String),
    /// Unmatched text handed to the shell as-is.
    RawShell(String),
}

const OPEN_PREFIX: &str = "open ";
const CLOSE_PREFIX: &str = "close ";

/// Trim and case-fold. Empty input yields `None`.
pub fn normalize(raw: &str) -> Option<String> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub struct Resolver {
    custom_commands: HashMap<String, String>,
}

impl Resolver {
    pub fn new(custom_commands: HashMap<String, String>) -> Self {
        Self { custom_commands }
    }

    pub fn custom_command_count(&self) -> usize {
        self.custom_commands.len()
    }

    pub fn resolve(&self, raw: &str) -> Option<Action> {
        let text = normalize(raw)?;

        if let Some(invocation) = self.custom_commands.get(&text) {
            return Some(Action::ShellAlias {
                phrase: text,
                invocation: invocation.clone(),
            });
        }

        if let Some(builtin) = Builtin::lookup(&text) {
            return Some(Action::Builtin(builtin));
        }

        if let Some(app) = prefixed_target(&text, OPEN_PREFIX) {
            return Some(Action::OpenApp(app));
        }
        if let Some(app) = prefixed_target(&text, CLOSE_PREFIX) {
            return Some(Action::CloseApp(app));
        }

        Some(Action::RawShell(text))
    }
}

fn prefixed_target(text: &str, prefix: &str) -> Option<String> {
    let rest = text.strip_prefix(prefix)?.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(pairs: &[(&str, &str)]) -> Resolver {
        Resolver::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn empty_input_is_not_resolved() {
        let resolver = resolver_with(&[]);
        assert_eq!(resolver.resolve(""), None);
        assert_eq!(resolver.resolve("   \t\n"), None);
    }

    #[test]
    fn alias_takes_priority_over_builtin() {
        let resolver = resolver_with(&[("lock", "loginctl lock-session")]);
        assert_eq!(
            resolver.resolve("  LOCK "),
            Some(Action::ShellAlias {
                phrase: "lock".to_string(),
                invocation: "loginctl lock-session".to_string(),
            })
        );
    }

    #[test]
    fn alias_takes_priority_over_open_prefix() {
        let resolver = resolver_with(&[("open notes", "code ~/notes")]);
        assert!(matches!(
            resolver.resolve("Open Notes"),
            Some(Action::ShellAlias { .. })
        ));
    }

    #[test]
    fn every_synonym_resolves_to_its_builtin() {
        let resolver = resolver_with(&[]);
        for builtin in Builtin::ALL {
            for phrase in builtin.synonyms() {
                assert_eq!(
                    resolver.resolve(&phrase.to_uppercase()),
                    Some(Action::Builtin(builtin)),
                    "phrase {phrase:?}"
                );
            }
        }
    }

    #[test]
    fn open_prefix_yields_case_folded_target() {
        let resolver = resolver_with(&[]);
        assert_eq!(
            resolver.resolve("Open Chrome"),
            Some(Action::OpenApp("chrome".to_string()))
        );
        assert_eq!(
            resolver.resolve("open   visual studio"),
            Some(Action::OpenApp("visual studio".to_string()))
        );
    }

    #[test]
    fn close_prefix_yields_target() {
        let resolver = resolver_with(&[]);
        assert_eq!(
            resolver.resolve("close Spotify"),
            Some(Action::CloseApp("spotify".to_string()))
        );
    }

    #[test]
    fn unmatched_text_falls_back_to_shell() {
        let resolver = resolver_with(&[]);
        assert_eq!(
            resolver.resolve("  LS -la /tmp "),
            Some(Action::RawShell("ls -la /tmp".to_string()))
        );
        // Bare verbs without a target are not app commands
        assert_eq!(resolver.resolve("open"), Some(Action::RawShell("open".to_string())));
        assert_eq!(
            resolver.resolve("opener"),
            Some(Action::RawShell("opener".to_string()))
        );
    }

    #[test]
    fn synonyms_are_unique_across_builtins() {
        let mut seen = std::collections::HashSet::new();
        for builtin in Builtin::ALL {
            for phrase in builtin.synonyms() {
                assert!(seen.insert(*phrase), "duplicate synonym {phrase:?}");
            }
        }
    }
}
