//! Transport: how a rendered command line becomes a child process.

pub mod local;
#[cfg(unix)]
pub mod signals;

#[cfg(not(unix))]
pub mod signals {
    //! Signal forwarding is Unix-only; elsewhere these are no-ops.

    pub fn install() {}

    pub fn take_interrupt() -> Option<i32> {
        None
    }

    pub fn isolate(_command: &mut std::process::Command) -> bool {
        false
    }

    pub struct ChildGuard;

    impl ChildGuard {
        pub fn register(_pid: u32, _terminal: bool) -> Self {
            Self
        }
    }
}

use thiserror::Error;

/// How a launched command line ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,

    /// Terminating signal, when the process was killed
    pub signal: Option<i32>,

    /// Signal `jig` itself received while the line ran
    pub interrupted: Option<i32>,
}

impl ExecOutput {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && self.interrupted.is_none()
    }
}

/// Failure to launch or wait for a command line.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("shell is empty; set shell needs a program")]
    EmptyShell,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wait error: {0}")]
    Wait(#[source] std::io::Error),
}

/// Runs one command line to completion.
pub trait Transport {
    fn run(&mut self, command: &str) -> Result<ExecOutput, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_success() {
        assert!(ExecOutput::exited(0).success());
        assert!(!ExecOutput::exited(1).success());
        let killed = ExecOutput {
            exit_code: None,
            signal: Some(9),
            interrupted: None,
        };
        assert!(!killed.success());
        let interrupted = ExecOutput {
            exit_code: Some(0),
            signal: None,
            interrupted: Some(15),
        };
        assert!(!interrupted.success());
    }

    #[test]
    fn test_transport_error_messages() {
        let e = TransportError::Spawn {
            program: "zsh".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(e.to_string(), "failed to spawn zsh: not found");
    }
}
