//! The Terminal Controller: saves the terminal attributes once at shell
//! start and transfers the controlling terminal between process groups.
//!
//! Every operation here is a no-op when standard input is not a tty (piped
//! input, a redirected script, a test harness) — there is no controlling
//! terminal to save or hand off, matching the teacher's
//! `ForegroundTerminalGuard`, which gates the same primitives on `isatty`.

use crate::fatal::fatal;
use crate::signals;

/// Owned for the lifetime of the process; holds the one snapshot taken at
/// startup, if standard input is a tty at all.
pub struct TerminalController {
    saved: Option<libc::termios>,
}

impl TerminalController {
    /// Captures the current terminal attributes. Called once, at startup.
    /// When standard input is not a tty, the controller is constructed in a
    /// disarmed state and every later operation on it is a no-op.
    pub fn install() -> Self {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
            return Self { saved: None };
        }

        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &mut saved) } != 0 {
            fatal("tcgetattr failed while installing the terminal controller");
        }
        Self { saved: Some(saved) }
    }

    /// The snapshot captured by `install`, if any.
    pub fn saved(&self) -> Option<libc::termios> {
        self.saved
    }

    /// Atomically transfer the controlling terminal to `pgrp`. SIGTTOU is
    /// blocked around the transfer — without that, the shell would stop
    /// itself while reassigning a terminal it no longer owns. If
    /// `restore_state` is given it is applied before SIGTTOU is unblocked.
    /// A no-op when there is no controlling terminal to transfer.
    pub fn give_terminal_to(&self, pgrp: libc::pid_t, restore_state: Option<&libc::termios>) {
        if self.saved.is_none() {
            return;
        }

        let _guard = signals::Blocked::new(libc::SIGTTOU);

        if unsafe { libc::tcsetpgrp(libc::STDIN_FILENO, pgrp) } != 0 {
            fatal(&format!("tcsetpgrp({pgrp}) failed"));
        }

        if let Some(state) = restore_state {
            if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSADRAIN, state) } != 0 {
                fatal("tcsetattr failed while restoring terminal state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_captures_a_snapshot_without_panicking() {
        // Only meaningful when stdin is a tty; under a test harness it
        // commonly is not, so we only assert the type is constructible and
        // exercise the structural API, not a real terminal transfer.
        let _ = std::mem::size_of::<TerminalController>();
    }
}
