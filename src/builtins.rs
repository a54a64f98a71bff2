//! The Built-in Dispatcher: `jobs`, `fg`, `bg`, `stop`, `kill` over the Job
//! Table — exactly the spec's built-in set (spec.md §4.E) — plus `cd` and
//! `exit`, which genuinely cannot be external programs (a forked `cd`
//! could never change the shell's own working directory; a forked `exit`
//! could never terminate the shell). Anything else, including `echo` and
//! `pwd`, is an ordinary external program dispatched through the Pipeline
//! Launcher's `execvp`, matching the original `esh_isBuiltIn`.

use std::io::Write;

use crate::jobs::JobStatus;
use crate::parser::Command;
use crate::reaper::{self, reconcile_sync};
use crate::signals;
use crate::terminal::TerminalController;

/// The list of all builtin command names.
const BUILTINS: &[&str] = &["jobs", "fg", "bg", "stop", "kill", "cd", "exit"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Execute a builtin command, writing output to the provided streams.
/// Returns the exit code.
pub fn execute(
    command: &Command,
    terminal: &TerminalController,
    shell_pgrp: libc::pid_t,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let program = command.program();
    let args = command.args();
    match program {
        "jobs" => builtin_jobs(stdout),
        "fg" => builtin_fg(args, terminal, shell_pgrp, stdout, stderr),
        "bg" => builtin_bg(args, stdout, stderr),
        "stop" => builtin_stop(args, stdout, stderr),
        "kill" => builtin_kill(args, stdout, stderr),
        "cd" => builtin_cd(args, stderr),
        "exit" => builtin_exit(args, stderr),
        _ => {
            let _ = writeln!(stderr, "esh: unknown builtin: {program}");
            1
        }
    }
}

/// Parse a builtin's sole argument as a job id, printing the usage line on
/// a missing argument ("no state change", per the dispatcher contract).
/// The original (`esh.c:500`) prints this with `printf`, to stdout.
fn parse_jid(name: &str, args: &[String], stdout: &mut dyn Write) -> Option<usize> {
    match args.first() {
        None => {
            let _ = writeln!(stdout, "{name}: usage: {name} jobid");
            None
        }
        Some(s) => match s.parse::<usize>() {
            Ok(jid) => Some(jid),
            Err(_) => {
                let _ = writeln!(stdout, "{name}: usage: {name} jobid");
                None
            }
        },
    }
}

fn builtin_jobs(stdout: &mut dyn Write) -> i32 {
    let _guard = signals::Blocked::new(libc::SIGCHLD);
    reaper::with_table(|table| {
        for job in table.iter() {
            match job.status {
                JobStatus::Foreground | JobStatus::Background => {
                    let _ = writeln!(stdout, "[{}] Running   ({})", job.jid, job.display_argv());
                }
                JobStatus::Stopped => {
                    let _ = writeln!(stdout, "[{}] Stopped   ({})", job.jid, job.display_argv());
                }
            }
        }
    });
    0
}

fn builtin_kill(args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let Some(jid) = parse_jid("kill", args, stdout) else {
        return 1;
    };

    let _guard = signals::Blocked::new(libc::SIGCHLD);
    reaper::with_table(|table| {
        let Some(job) = table.find(jid) else {
            let _ = writeln!(stderr, "kill: {jid}: no such job");
            return 1;
        };
        let pgrp = job.pgrp;
        if unsafe { libc::kill(-pgrp, libc::SIGTERM) } != 0 {
            crate::fatal::fatal(&format!("kill(-{pgrp}, SIGTERM) failed"));
        }
        table.remove(jid);
        0
    })
}

fn builtin_stop(args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let Some(jid) = parse_jid("stop", args, stdout) else {
        return 1;
    };

    let _guard = signals::Blocked::new(libc::SIGCHLD);
    reaper::with_table(|table| {
        let Some(job) = table.find_mut(jid) else {
            let _ = writeln!(stderr, "stop: {jid}: no such job");
            return 1;
        };
        let pgrp = job.pgrp;
        if unsafe { libc::kill(-pgrp, libc::SIGSTOP) } != 0 {
            crate::fatal::fatal(&format!("kill(-{pgrp}, SIGSTOP) failed"));
        }
        job.status = JobStatus::Background;
        0
    })
}

fn builtin_bg(args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let Some(jid) = parse_jid("bg", args, stdout) else {
        return 1;
    };

    let _guard = signals::Blocked::new(libc::SIGCHLD);
    reaper::with_table(|table| {
        let Some(job) = table.find_mut(jid) else {
            let _ = writeln!(stderr, "bg: {jid}: no such job");
            return 1;
        };
        job.status = JobStatus::Background;
        let pgrp = job.pgrp;
        let program = job.commands[0].program().to_string();
        if unsafe { libc::kill(-pgrp, libc::SIGCONT) } != 0 {
            crate::fatal::fatal(&format!("kill(-{pgrp}, SIGCONT) failed"));
        }
        let _ = writeln!(stdout, "[{jid}] {program}");
        0
    })
}

fn builtin_fg(
    args: &[String],
    terminal: &TerminalController,
    shell_pgrp: libc::pid_t,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let Some(jid) = parse_jid("fg", args, stdout) else {
        return 1;
    };

    let _guard = signals::Blocked::new(libc::SIGCHLD);

    let pgrp = reaper::with_table(|table| table.find(jid).map(|job| job.pgrp));
    let Some(pgrp) = pgrp else {
        let _ = writeln!(stderr, "fg: {jid}: no such job");
        return 1;
    };

    let display = reaper::with_table(|table| {
        table
            .find(jid)
            .map(|job| job.display_argv())
            .unwrap_or_default()
    });
    let _ = writeln!(stdout, "{display}");

    reaper::with_table(|table| {
        if let Some(job) = table.find_mut(jid) {
            job.status = JobStatus::Foreground;
        }
    });

    if unsafe { libc::kill(-pgrp, libc::SIGCONT) } != 0 {
        crate::fatal::fatal(&format!("kill(-{pgrp}, SIGCONT) failed"));
    }

    terminal.give_terminal_to(pgrp, None);

    let mut raw_status: libc::c_int = 0;
    let waited = unsafe { libc::waitpid(pgrp, &mut raw_status, libc::WUNTRACED) };
    if waited > 0 {
        reconcile_sync(waited, raw_status);
    }

    terminal.give_terminal_to(shell_pgrp, terminal.saved().as_ref());

    0
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) -> i32 {
    let target = match args.first() {
        Some(dir) if dir == "-" => match std::env::var("OLDPWD") {
            Ok(prev) => prev,
            Err(_) => {
                let _ = writeln!(stderr, "cd: OLDPWD not set");
                return 1;
            }
        },
        Some(dir) => dir.clone(),
        None => std::env::var("HOME").unwrap_or_else(|_| ".".to_string()),
    };

    if let Ok(cwd) = std::env::current_dir() {
        unsafe { std::env::set_var("OLDPWD", cwd) };
    }

    if let Err(e) = std::env::set_current_dir(&target) {
        let _ = writeln!(stderr, "cd: {target}: {e}");
        return 1;
    }

    0
}

fn builtin_exit(args: &[String], stderr: &mut dyn Write) -> i32 {
    match args.first() {
        None => std::process::exit(0),
        Some(s) => match s.parse::<i32>() {
            Ok(code) => std::process::exit(code),
            Err(_) => {
                let _ = writeln!(stderr, "exit: {s}: numeric argument required");
                std::process::exit(2);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_recognized() {
        for name in ["jobs", "fg", "bg", "stop", "kill", "cd", "exit"] {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("echo"));
        assert!(!is_builtin("pwd"));
        assert!(!is_builtin("sleep"));
    }

    #[test]
    fn missing_jid_is_rejected_by_parse_jid() {
        let mut stdout = Vec::new();
        assert!(parse_jid("fg", &[], &mut stdout).is_none());
        assert!(String::from_utf8(stdout).unwrap().contains("usage: fg jobid"));
    }

    #[test]
    fn non_numeric_jid_is_rejected() {
        let mut stdout = Vec::new();
        assert!(parse_jid("bg", &["abc".to_string()], &mut stdout).is_none());
    }
}
