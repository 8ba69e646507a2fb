//! Local execution through the configured shell.

use super::{signals, ExecOutput, Transport, TransportError};
use crate::core::types::Settings;
use std::process::{Command, Stdio};

/// Runs each command line as `<shell...> <line>` with the terminal's stdio.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: Vec<String>,
}

impl LocalTransport {
    pub fn new(shell: Vec<String>) -> Self {
        signals::install();
        Self { shell }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.shell.clone())
    }
}

impl Transport for LocalTransport {
    fn run(&mut self, command: &str) -> Result<ExecOutput, TransportError> {
        // A signal that arrived between lines stops the run before the next launch.
        if let Some(sig) = signals::take_interrupt() {
            return Ok(ExecOutput {
                interrupted: Some(sig),
                ..ExecOutput::default()
            });
        }

        let (program, leading) = self.shell.split_first().ok_or(TransportError::EmptyShell)?;
        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let terminal = signals::isolate(&mut cmd);
        let mut child = cmd
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        let status = {
            let _guard = signals::ChildGuard::register(child.id(), terminal);
            child.wait().map_err(TransportError::Wait)?
        };

        Ok(ExecOutput {
            exit_code: status.code(),
            signal: terminating_signal(&status),
            interrupted: signals::take_interrupt(),
        })
    }
}

#[cfg(unix)]
fn terminating_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
