use clap::ValueEnum;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Vocabularies compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BuiltinProfile {
    /// AHEAD, BACK, PLAYPAUSE, PREVIOUS, NEXT (and the short PP).
    #[default]
    Transport,
    /// UP, DOWN, LEFT, RIGHT, A, B, C, RESET, START.
    Gamepad,
}

impl BuiltinProfile {
    pub fn label(self) -> &'static str {
        match self {
            BuiltinProfile::Transport => "transport",
            BuiltinProfile::Gamepad => "gamepad",
        }
    }

    fn commands(self) -> &'static [BuiltinCommand] {
        match self {
            BuiltinProfile::Transport => TRANSPORT_COMMANDS,
            BuiltinProfile::Gamepad => GAMEPAD_COMMANDS,
        }
    }
}

struct BuiltinCommand {
    token: &'static str,
    label: &'static str,
    args: Option<&'static [&'static str]>,
}

const TRANSPORT_COMMANDS: &[BuiltinCommand] = &[
    BuiltinCommand {
        token: "AHEAD",
        label: "Seek forwards",
        args: Some(&["/command:Ahead by 30 seconds"]),
    },
    BuiltinCommand {
        token: "BACK",
        label: "Seek backwards",
        args: Some(&["/command:Back by 30 seconds"]),
    },
    BuiltinCommand {
        token: "PLAYPAUSE",
        label: "Play/Pause",
        args: Some(&["/playpause"]),
    },
    BuiltinCommand {
        token: "PP",
        label: "Play/Pause",
        args: Some(&["/playpause"]),
    },
    BuiltinCommand {
        token: "PREVIOUS",
        label: "Previous song",
        args: Some(&["/prev"]),
    },
    BuiltinCommand {
        token: "NEXT",
        label: "Next song",
        args: Some(&["/next"]),
    },
];

const GAMEPAD_COMMANDS: &[BuiltinCommand] = &[
    BuiltinCommand {
        token: "UP",
        label: "Volume up",
        args: Some(&["/command:Up"]),
    },
    BuiltinCommand {
        token: "DOWN",
        label: "Volume down",
        args: Some(&["/command:Down"]),
    },
    BuiltinCommand {
        token: "LEFT",
        label: "Seek backwards",
        args: Some(&["/command:Back by 30 seconds"]),
    },
    BuiltinCommand {
        token: "RIGHT",
        label: "Seek forwards",
        args: Some(&["/command:Ahead by 30 seconds"]),
    },
    BuiltinCommand {
        token: "A",
        label: "Previous song",
        args: Some(&["/prev"]),
    },
    BuiltinCommand {
        token: "B",
        label: "Play/Pause",
        args: Some(&["/playpause"]),
    },
    BuiltinCommand {
        token: "C",
        label: "Next song",
        args: Some(&["/next"]),
    },
    // Reserved for "delete current song"; the player has no command line switch for it.
    BuiltinCommand {
        token: "RESET",
        label: "Delete current song",
        args: None,
    },
    BuiltinCommand {
        token: "START",
        label: "Open/Show player",
        args: Some(&[]),
    },
];

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid profile YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("profile '{name}' defines no commands")]
    Empty { name: String },
    #[error("command token {token:?} must be non-empty and carry no surrounding whitespace")]
    InvalidToken { token: String },
    #[error("arguments for {token} are malformed: {reason}")]
    Args { token: String, reason: String },
}

/// What one recognized token does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCommand {
    label: String,
    args: Option<Vec<String>>,
}

impl ProfileCommand {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Arguments for the target, or `None` when the token is recognized but has no action.
    pub fn args(&self) -> Option<&[String]> {
        self.args.as_deref()
    }
}

/// Immutable token-to-invocation mapping selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchProfile {
    name: String,
    target: PathBuf,
    commands: BTreeMap<String, ProfileCommand>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileFile {
    name: String,
    #[serde(default)]
    target: Option<PathBuf>,
    commands: BTreeMap<String, ProfileFileCommand>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileFileCommand {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    args: Option<String>,
}

impl DispatchProfile {
    /// Start an empty profile; add entries with [`DispatchProfile::with_command`].
    pub fn new(name: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            commands: BTreeMap::new(),
        }
    }

    pub fn builtin(kind: BuiltinProfile, target: impl Into<PathBuf>) -> Self {
        let mut profile = Self::new(kind.label(), target);
        for command in kind.commands() {
            profile.commands.insert(
                command.token.to_string(),
                ProfileCommand {
                    label: command.label.to_string(),
                    args: command
                        .args
                        .map(|args| args.iter().map(|arg| (*arg).to_string()).collect()),
                },
            );
        }
        profile
    }

    /// Add a token whose argument string is split with shell quoting rules.
    pub fn with_command(
        mut self,
        token: &str,
        label: &str,
        args: Option<&str>,
    ) -> Result<Self, ProfileError> {
        if token.is_empty() || token.trim() != token {
            return Err(ProfileError::InvalidToken {
                token: token.to_string(),
            });
        }
        let args = args
            .map(|raw| {
                shell_words::split(raw).map_err(|err| ProfileError::Args {
                    token: token.to_string(),
                    reason: err.to_string(),
                })
            })
            .transpose()?;
        self.commands.insert(
            token.to_string(),
            ProfileCommand {
                label: label.to_string(),
                args,
            },
        );
        Ok(self)
    }

    /// Parse a YAML profile; `default_target` applies when the file names none.
    pub fn from_yaml_str(text: &str, default_target: PathBuf) -> Result<Self, ProfileError> {
        let file: ProfileFile = serde_yaml::from_str(text)?;
        if file.commands.is_empty() {
            return Err(ProfileError::Empty { name: file.name });
        }
        let target = file.target.unwrap_or(default_target);
        file.commands
            .iter()
            .try_fold(Self::new(file.name.clone(), target), |profile, (token, entry)| {
                let label = entry.label.as_deref().unwrap_or(token);
                profile.with_command(token, label, entry.args.as_deref())
            })
    }

    pub fn load(path: &Path, default_target: PathBuf) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, default_target)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, token: &str) -> Option<&ProfileCommand> {
        self.commands.get(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
