//! Signal handling while command lines run.
//!
//! Each line runs in its own process group. SIGINT, SIGTERM and SIGHUP
//! that reach `jig` are relayed to that whole group, so anything the
//! line started in the background goes down with it. When `jig` owns the
//! terminal the group is also made the terminal's foreground group for
//! the duration of the line; Ctrl-C then reaches the line directly.
//! Any relayed signal is remembered so the executor stops before
//! launching anything else.

#![allow(unsafe_code)]

use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Once;

static CHILD_PGID: AtomicI32 = AtomicI32::new(0);
static RECEIVED: AtomicI32 = AtomicI32::new(0);
static INSTALL: Once = Once::new();

/// Install the handlers once per process.
pub fn install() {
    INSTALL.call_once(|| unsafe {
        for sig in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
            libc::signal(sig, relay_handler as *const () as libc::sighandler_t);
        }
        // Handing the terminal back and forth with tcsetpgrp(3) from a
        // background group raises SIGTTOU.
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
    });
}

extern "C" fn relay_handler(sig: libc::c_int) {
    RECEIVED.store(sig, Ordering::SeqCst);
    let pgid = CHILD_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        // kill(2) is async-signal-safe
        unsafe {
            libc::kill(-pgid, sig);
        }
    }
}

/// Take the signal received since the last call, if any.
pub fn take_interrupt() -> Option<i32> {
    match RECEIVED.swap(0, Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

/// Put the child in a fresh process group. Returns whether it will also
/// take over the terminal, which happens only when `jig` is in the
/// terminal's foreground group.
pub fn isolate(command: &mut Command) -> bool {
    command.process_group(0);
    let foreground = unsafe {
        libc::isatty(libc::STDIN_FILENO) == 1
            && libc::tcgetpgrp(libc::STDIN_FILENO) == libc::getpgrp()
    };
    if foreground {
        // Runs between fork and exec; only async-signal-safe calls.
        unsafe {
            command.pre_exec(|| {
                libc::setpgid(0, 0);
                libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpid());
                libc::signal(libc::SIGTTOU, libc::SIG_DFL);
                Ok(())
            });
        }
    }
    foreground
}

/// Marks a child's process group as the relay target until dropped.
pub struct ChildGuard {
    terminal: bool,
}

impl ChildGuard {
    /// `pid` must be a child started through [`isolate`], so it leads its group.
    pub fn register(pid: u32, terminal: bool) -> Self {
        let pgid = i32::try_from(pid).unwrap_or(0);
        if terminal && pgid > 0 {
            // Also done in the child; whichever runs first wins the race
            // against the line reading from the terminal.
            unsafe {
                libc::tcsetpgrp(libc::STDIN_FILENO, pgid);
            }
        }
        CHILD_PGID.store(pgid, Ordering::SeqCst);
        // A signal that landed between spawn and here was recorded with no
        // group to relay to.
        let pending = RECEIVED.load(Ordering::SeqCst);
        if pending != 0 && pgid > 0 {
            unsafe {
                libc::kill(-pgid, pending);
            }
        }
        Self { terminal }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        CHILD_PGID.store(0, Ordering::SeqCst);
        if self.terminal {
            unsafe {
                libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpgrp());
            }
        }
    }
}
