//! The Signal Arbiter: installs/removes handlers and blocks/unblocks
//! signals around the critical sections that mutate or depend on the Job
//! Table.
//!
//! Blocking is a mask change on the calling thread. Block/unblock are
//! always paired lexically around short critical sections, so no
//! counted-semaphore discipline is needed here — `unblock` simply restores
//! the removed state.

use crate::fatal::fatal;

pub type SiginfoHandler = extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void);

/// Install `handler` for `signal` with siginfo-style delivery. Used for the
/// child-status handler, which needs the reporting pid/status that plain
/// `sa_handler` delivery does not provide.
pub fn set_handler(signal: libc::c_int, handler: SiginfoHandler) {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
            fatal(&format!("sigaction({signal}) failed"));
        }
    }
}

/// Set a signal's disposition to `SIG_IGN`. Used for the signals the shell
/// itself must never act on while it owns the terminal (SIGTTOU, SIGTTIN,
/// SIGTSTP) and for SIGINT/SIGQUIT at the prompt.
pub fn ignore(signal: libc::c_int) {
    unsafe {
        if libc::signal(signal, libc::SIG_IGN) == libc::SIG_ERR {
            fatal(&format!("signal({signal}, SIG_IGN) failed"));
        }
    }
}

/// Block `signal` on the calling thread's mask.
pub fn block(signal: libc::c_int) {
    mask(libc::SIG_BLOCK, signal);
}

/// Unblock `signal` on the calling thread's mask.
pub fn unblock(signal: libc::c_int) {
    mask(libc::SIG_UNBLOCK, signal);
}

fn mask(how: libc::c_int, signal: libc::c_int) {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, signal);
        if libc::pthread_sigmask(how, &set, std::ptr::null_mut()) != 0 {
            fatal("pthread_sigmask failed");
        }
    }
}

/// RAII guard: blocks `signal` on construction, unblocks it on drop. Used
/// to scope every critical section that touches the Job Table.
pub struct Blocked {
    signal: libc::c_int,
}

impl Blocked {
    pub fn new(signal: libc::c_int) -> Self {
        block(signal);
        Self { signal }
    }
}

impl Drop for Blocked {
    fn drop(&mut self) {
        unblock(self.signal);
    }
}
