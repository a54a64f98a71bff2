//! The Child-Status Reaper: one reconciliation routine reached from two
//! entry points — the asynchronous SIGCHLD handler and a synchronous call
//! made by the main loop immediately after a targeted foreground wait.
//!
//! The Job Table lives behind a `Mutex` reachable from the signal handler
//! via this module's registered static handle (see spec design notes on
//! globally mutable state: a shell context passed explicitly is preferred
//! in general, but the signal handler has no argument to receive one
//! through). The main thread only ever contends with the handler for this
//! lock while the handler is itself running — never concurrently, because
//! every main-thread critical section that touches the table blocks
//! SIGCHLD for its duration.

use std::sync::{Mutex, OnceLock};

use crate::jobs::{JobStatus, JobTable};
use crate::signals;

static JOB_TABLE: OnceLock<Mutex<JobTable>> = OnceLock::new();

/// Initialize the Job Table. Called once from the Read-Eval Loop's
/// startup, before the child-status handler is installed.
pub fn init(table: JobTable) {
    if JOB_TABLE.set(Mutex::new(table)).is_err() {
        panic!("reaper::init called more than once");
    }
}

/// Run `f` with exclusive access to the Job Table. Callers that are not
/// the signal handler itself must hold SIGCHLD blocked (`signals::Blocked`)
/// for the duration, per the table's ownership rule.
pub fn with_table<R>(f: impl FnOnce(&mut JobTable) -> R) -> R {
    let mutex = JOB_TABLE.get().expect("reaper::init was not called");
    let mut guard = mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

/// Install the SIGCHLD handler. Must run after `init`.
pub fn install_handler() {
    signals::set_handler(libc::SIGCHLD, handle_sigchld);
}

/// The asynchronous entry point: invoked on child-status delivery.
/// Repeatedly polls for any child with a reportable status, including
/// stopped children, until none remain.
pub extern "C" fn handle_sigchld(
    _signo: libc::c_int,
    _info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    loop {
        let mut raw_status: libc::c_int = 0;
        let pid = unsafe { libc::waitpid(-1, &mut raw_status, libc::WUNTRACED | libc::WNOHANG) };
        if pid <= 0 {
            break;
        }
        reconcile(pid, raw_status, false);
    }
}

/// The synchronous entry point: called from the main loop with the status
/// and pid already collected from a targeted wait on the foreground job.
pub fn reconcile_sync(pid: libc::pid_t, raw_status: libc::c_int) {
    reconcile(pid, raw_status, true);
}

/// Reconcile one (pid, status) event against the Job Table.
///
/// - Stopped: the job's status becomes `Stopped`; the synchronous path
///   additionally prints the `Stopped` line (the async path defers that
///   to whoever next observes the job — `jobs`, or a later `fg`).
/// - Anything else reportable under `WUNTRACED` (normal exit or
///   termination by signal) means the process is gone: the job is
///   removed, and a `DONE` line is printed unless the job was foreground
///   (a foreground job's completion is implied by the prompt returning).
fn reconcile(pid: libc::pid_t, raw_status: libc::c_int, synchronous: bool) {
    with_table(|table| {
        if unsafe { libc::WIFSTOPPED(raw_status) } {
            if let Some(job) = table.find_by_pgrp_mut(pid) {
                job.status = JobStatus::Stopped;
                if synchronous {
                    println!("[{}] Stopped   ({})", job.jid, job.display_argv());
                }
            }
            return;
        }

        let Some(job) = table.find_by_pgrp(pid) else {
            return;
        };
        let jid = job.jid;
        let was_foreground = job.status == JobStatus::Foreground;
        table.remove(jid);
        if !was_foreground {
            println!("\n[{jid}] DONE");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Command;
    use std::sync::Once;

    fn make_job(jid: usize, pgrp: libc::pid_t, status: JobStatus) -> crate::jobs::Job {
        crate::jobs::Job {
            jid,
            pgrp,
            status,
            commands: vec![Command {
                argv: vec!["sleep".to_string(), "30".to_string()],
                input_redirect: None,
                output_redirect: None,
                append: false,
            }],
            bg_marker: true,
        }
    }

    // `init` is process-global (`OnceLock`); only the first test to touch
    // it actually initializes the table, so every test in this module
    // works against the one shared instance and must not assume it is
    // the sole job present.
    static INIT: Once = Once::new();

    fn ensure_init() {
        INIT.call_once(|| init(JobTable::new()));
    }

    #[test]
    fn stop_then_stop_again_is_idempotent() {
        ensure_init();
        let pgrp = 987_654; // distinct from other tests' fixture pgrps
        with_table(|t| t.append(make_job(9001, pgrp, JobStatus::Background)));

        // Raw wait-status encoding for "stopped by SIGSTOP": low byte 0x7f.
        let stopped_status: libc::c_int = (libc::SIGSTOP << 8) | 0x7f;

        reconcile_sync(pgrp, stopped_status);
        reconcile_sync(pgrp, stopped_status);

        with_table(|t| {
            assert_eq!(t.find(9001).unwrap().status, JobStatus::Stopped);
        });
    }

    #[test]
    fn exit_removes_the_job_and_is_idempotent() {
        ensure_init();
        let pgrp = 987_655;
        with_table(|t| t.append(make_job(9002, pgrp, JobStatus::Background)));

        let exited_status: libc::c_int = 0; // WIFEXITED true, exit code 0
        reconcile_sync(pgrp, exited_status);
        reconcile_sync(pgrp, exited_status); // second delivery: no-op, no panic

        with_table(|t| assert!(t.find(9002).is_none()));
    }

    #[test]
    fn foreground_exit_prints_no_done_line() {
        ensure_init();
        let pgrp = 987_656;
        with_table(|t| t.append(make_job(9003, pgrp, JobStatus::Foreground)));
        reconcile_sync(pgrp, 0);
        with_table(|t| assert!(t.find(9003).is_none()));
    }
}
