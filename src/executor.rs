use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use crate::history;

/// Launches an entry's `exec` string.
///
/// Fire-and-forget: nothing is reported back to the caller, failures are logged.
pub trait Executor {
    fn execute(&self, exec: &str);
}

/// Spawns commands detached from the launcher's session and records usage.
#[derive(Debug, Clone, Default)]
pub struct Spawner {
    history_path: Option<PathBuf>,
}

impl Spawner {
    pub fn new(history_path: Option<PathBuf>) -> Self {
        Self { history_path }
    }

    fn spawn(&self, exec: &str) -> std::io::Result<()> {
        let cmd_parts = argv(exec)?;
        let Some((program, args)) = cmd_parts.split_first() else {
            return Ok(());
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // New session so the child outlives the launcher window.
        // SAFETY: setsid is async-signal-safe and touches no parent state.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid()
                    .map(|_| ())
                    .map_err(std::io::Error::from)
            });
        }

        command.spawn()?;
        Ok(())
    }
}

/// Splits `exec` into words, honouring shell quoting. No shell is involved.
pub(crate) fn argv(exec: &str) -> std::io::Result<Vec<String>> {
    shell_words::split(exec).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

impl Executor for Spawner {
    fn execute(&self, exec: &str) {
        if let Some(path) = &self.history_path {
            if let Err(e) = history::record_usage(path, exec) {
                log::warn!("Failed to record usage for '{}': {}", exec, e);
            }
        }

        match self.spawn(exec) {
            Ok(()) => log::info!("Launched '{}'", exec),
            Err(e) => log::error!("Failed to launch '{}': {}", exec, e),
        }
    }
}
