use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;
use thiserror::Error;

use super::ExternalInvocation;
use crate::log_debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Error)]
#[error("failed to start {program}: {source}")]
pub struct LaunchError {
    pub program: String,
    #[source]
    pub source: io::Error,
}

/// Starts invocations without waiting on them.
pub trait ProcessLauncher: Send + Sync {
    /// Report only whether the process could be started.
    fn launch(&self, invocation: &ExternalInvocation) -> Result<(), LaunchError>;
}

/// Launches the target detached, windowless, with stdio sent to the null device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, invocation: &ExternalInvocation) -> Result<(), LaunchError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }
        let child = command.spawn().map_err(|source| LaunchError {
            program: invocation.program.display().to_string(),
            source,
        })?;
        reap_in_background(child);
        Ok(())
    }
}

/// Collect the exit status off-thread so finished targets do not linger as zombies.
fn reap_in_background(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(err) = spawned {
        log_debug(&format!("could not start reaper for pid {pid}: {err}"));
    }
}
