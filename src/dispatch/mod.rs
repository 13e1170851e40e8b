//! Maps decoded tokens to invocations of the target program and fires them off.
//!
//! Lookup is a pure function of (token, profile). Launching is fire-and-forget: the
//! outcome of the started process is never awaited or inspected.

mod launcher;
mod profile;

use std::fmt;
use std::path::PathBuf;

use crate::decoder::CommandToken;
use crate::log_debug;

pub use launcher::{LaunchError, ProcessLauncher, SystemLauncher};
pub use profile::{BuiltinProfile, DispatchProfile, ProfileCommand, ProfileError};

/// A fully formed command line for the target program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ExternalInvocation {
    /// Shell-quoted rendering, for logs and status output.
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        std::iter::once(&*program)
            .chain(self.args.iter().map(String::as_str))
            .map(|part| shell_words::quote(part).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ExternalInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Result of looking a token up in a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    Invoke {
        label: &'a str,
        invocation: ExternalInvocation,
    },
    /// Recognized token without an action in this profile.
    NoAction { label: &'a str },
    Unrecognized,
}

pub fn resolve<'a>(token: &CommandToken, profile: &'a DispatchProfile) -> Resolution<'a> {
    let Some(command) = profile.lookup(token.as_str()) else {
        return Resolution::Unrecognized;
    };
    match command.args() {
        Some(args) => Resolution::Invoke {
            label: command.label(),
            invocation: ExternalInvocation {
                program: profile.target().to_path_buf(),
                args: args.to_vec(),
            },
        },
        None => Resolution::NoAction {
            label: command.label(),
        },
    }
}

/// Invocation for `token` under `profile`, if the token maps to one.
pub fn dispatch(token: &CommandToken, profile: &DispatchProfile) -> Option<ExternalInvocation> {
    match resolve(token, profile) {
        Resolution::Invoke { invocation, .. } => Some(invocation),
        Resolution::NoAction { .. } | Resolution::Unrecognized => None,
    }
}

/// What happened to one token.
#[derive(Debug)]
pub enum DispatchOutcome {
    Launched {
        token: CommandToken,
        label: String,
        invocation: ExternalInvocation,
    },
    Ignored {
        token: CommandToken,
        label: String,
    },
    Unrecognized {
        token: CommandToken,
    },
    LaunchFailed {
        token: CommandToken,
        invocation: ExternalInvocation,
        error: LaunchError,
    },
}

/// Stateless relay from tokens to the launcher under one fixed profile.
pub struct CommandDispatcher {
    profile: DispatchProfile,
    launcher: Box<dyn ProcessLauncher>,
}

impl CommandDispatcher {
    pub fn new(profile: DispatchProfile, launcher: Box<dyn ProcessLauncher>) -> Self {
        Self { profile, launcher }
    }

    pub fn profile(&self) -> &DispatchProfile {
        &self.profile
    }

    /// Resolve `token` and, when it maps to an invocation, start it without waiting.
    pub fn relay(&self, token: &CommandToken) -> DispatchOutcome {
        match resolve(token, &self.profile) {
            Resolution::Invoke { label, invocation } => {
                log_debug(&format!("{token}: {label} -> {invocation}"));
                match self.launcher.launch(&invocation) {
                    Ok(()) => DispatchOutcome::Launched {
                        token: token.clone(),
                        label: label.to_string(),
                        invocation,
                    },
                    Err(error) => DispatchOutcome::LaunchFailed {
                        token: token.clone(),
                        invocation,
                        error,
                    },
                }
            }
            Resolution::NoAction { label } => DispatchOutcome::Ignored {
                token: token.clone(),
                label: label.to_string(),
            },
            Resolution::Unrecognized => DispatchOutcome::Unrecognized {
                token: token.clone(),
            },
        }
    }
}
