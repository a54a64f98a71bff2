//! The Pipeline Launcher: forks a pipeline's children into a single
//! process group, wires pipes and redirections between stages, and either
//! waits for the group in the foreground or records it as a background
//! job.

use std::ffi::CString;
use std::os::unix::process::CommandExt;
use std::process::{Command as ProcessCommand, Stdio};

use os_pipe::PipeReader;

use crate::builtins;
use crate::jobs::{Job, JobStatus};
use crate::parser::Pipeline;
use crate::plugin::PluginRegistry;
use crate::reaper::{self, reconcile_sync};
use crate::signals;
use crate::terminal::TerminalController;

/// Hand one parsed pipeline to the launcher. `shell_pgrp` is the shell's
/// own process group, used to restore terminal ownership after a
/// foreground job.
pub fn launch(
    mut pipeline: Pipeline,
    registry: &PluginRegistry,
    terminal: &TerminalController,
    shell_pgrp: libc::pid_t,
) {
    let first = &pipeline.commands[0];

    if registry.intercept(first) {
        if pipeline.commands.len() > 1 {
            eprintln!("esh: a plug-in-handled command cannot start a pipeline");
        }
        return;
    }

    let builtin_stage_count = pipeline
        .commands
        .iter()
        .filter(|c| builtins::is_builtin(c.program()))
        .count();

    if builtin_stage_count > 0 {
        if builtin_stage_count == 1 && pipeline.commands.len() == 1 && builtins::is_builtin(first.program()) {
            let mut stdout = std::io::stdout();
            let mut stderr = std::io::stderr();
            builtins::execute(first, terminal, shell_pgrp, &mut stdout, &mut stderr);
        } else {
            eprintln!("esh: builtins cannot be mixed with forked pipeline stages");
        }
        return;
    }

    fork_and_run(&mut pipeline, terminal, shell_pgrp);
}

fn fork_and_run(pipeline: &mut Pipeline, terminal: &TerminalController, shell_pgrp: libc::pid_t) {
    let _blocked = signals::Blocked::new(libc::SIGCHLD);

    let mut pgrp: Option<libc::pid_t> = None;
    let mut prev_read: Option<PipeReader> = None;
    let stage_count = pipeline.commands.len();

    for (index, command) in pipeline.commands.iter().enumerate() {
        let is_last = index + 1 == stage_count;

        let (pipe_read, pipe_write) = if is_last {
            (None, None)
        } else {
            match os_pipe::pipe() {
                Ok((r, w)) => (Some(r), Some(w)),
                Err(e) => {
                    eprintln!("esh: pipe: {e}");
                    return;
                }
            }
        };

        let mut cmd = ProcessCommand::new(&command.argv[0]);
        cmd.args(&command.argv[1..]);

        match prev_read.take() {
            Some(reader) => {
                cmd.stdin(Stdio::from(reader));
            }
            None => {
                cmd.stdin(Stdio::inherit());
            }
        }

        match &pipe_write {
            Some(writer) => {
                let writer = writer.try_clone().expect("dup pipe writer");
                cmd.stdout(Stdio::from(writer));
            }
            None => {
                cmd.stdout(Stdio::inherit());
            }
        }
        cmd.stderr(Stdio::inherit());

        let argv = command.argv.clone();
        let input_redirect = command.input_redirect.clone();
        let output_redirect = command.output_redirect.clone();
        let append = command.append;
        let target_pgrp = pgrp.unwrap_or(0);

        unsafe {
            cmd.pre_exec(move || {
                setpgid_child(target_pgrp)?;
                reset_child_dispositions();
                apply_redirections(input_redirect.as_deref(), output_redirect.as_deref(), append)?;
                exec_or_not_found(&argv)
            });
        }

        let spawned = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                eprintln!("esh: {}: {e}", command.argv[0]);
                drop(pipe_read);
                drop(pipe_write);
                return;
            }
        };

        let child_pid = spawned.id() as libc::pid_t;
        if pgrp.is_none() {
            pgrp = Some(child_pid);
        }
        let group = pgrp.unwrap();
        // Race-free double-set: the child sets its own group too, so
        // whichever of parent/child runs first wins without a window
        // where the group is unset.
        unsafe {
            libc::setpgid(child_pid, group);
        }

        // The child's own copy of the write end (and of the previous
        // stage's read end) must be closed in the parent once spawned;
        // `Stdio::from` already moved ownership into `cmd`, so dropping
        // our handles here only closes the parent's copies.
        drop(pipe_write);
        prev_read = pipe_read;

        // We don't keep the Child handle around: the reaper and the
        // foreground wait both operate on the whole process group (via
        // raw `waitpid`), not on individual children.
        drop(spawned);
    }

    drop(prev_read);

    let Some(pgrp) = pgrp else {
        return;
    };

    let jid = reaper::with_table(|t| t.next_jid());
    pipeline.jid = Some(jid);
    pipeline.pgrp = Some(pgrp);

    let commands = std::mem::take(&mut pipeline.commands);

    if pipeline.bg_marker {
        let job = Job {
            jid,
            pgrp,
            status: JobStatus::Background,
            commands,
            bg_marker: true,
        };
        reaper::with_table(|t| t.append(job));
        println!("[{jid}] {pgrp}");
    } else {
        let job = Job {
            jid,
            pgrp,
            status: JobStatus::Foreground,
            commands,
            bg_marker: false,
        };
        reaper::with_table(|t| t.append(job));

        terminal.give_terminal_to(pgrp, None);

        let mut raw_status: libc::c_int = 0;
        let waited = unsafe { libc::waitpid(pgrp, &mut raw_status, libc::WUNTRACED) };
        if waited > 0 {
            reconcile_sync(waited, raw_status);
        }

        terminal.give_terminal_to(shell_pgrp, terminal.saved().as_ref());
    }
}

/// Child-side: join `target` (an existing group) or start a new one at
/// our own pid when `target == 0`.
fn setpgid_child(target: libc::pid_t) -> std::io::Result<()> {
    if unsafe { libc::setpgid(0, target) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Child-side: the new process image inherits our signal mask and
/// dispositions; put back the defaults a normal program expects before
/// handing control to it. SIGCHLD is unblocked since the child has no
/// business observing its own descendants through the shell's mask.
fn reset_child_dispositions() {
    for signal in [
        libc::SIGINT,
        libc::SIGQUIT,
        libc::SIGTSTP,
        libc::SIGTTIN,
        libc::SIGTTOU,
        libc::SIGPIPE,
    ] {
        unsafe {
            libc::signal(signal, libc::SIG_DFL);
        }
    }
    signals::unblock(libc::SIGCHLD);
}

/// Child-side: open and `dup2` redirection paths onto stdin/stdout. Runs
/// after the pipe plumbing, so a redirection present alongside a pipe
/// connection overrides it, per stage.
fn apply_redirections(
    input: Option<&str>,
    output: Option<&str>,
    append: bool,
) -> std::io::Result<()> {
    if let Some(path) = input {
        let cpath = cstring(path)?;
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if unsafe { libc::dup2(fd, libc::STDIN_FILENO) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        unsafe {
            libc::close(fd);
        }
    }

    if let Some(path) = output {
        let cpath = cstring(path)?;
        let flags = libc::O_WRONLY
            | libc::O_CREAT
            | if append { libc::O_APPEND } else { libc::O_TRUNC };
        // rwx for the owner only, matching the original implementation.
        let fd = unsafe { libc::open(cpath.as_ptr(), flags, 0o700) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if unsafe { libc::dup2(fd, libc::STDOUT_FILENO) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        unsafe {
            libc::close(fd);
        }
    }

    Ok(())
}

fn cstring(s: &str) -> std::io::Result<CString> {
    CString::new(s).map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "nul byte in path"))
}

/// Child-side: exec the program, or print `command not found` and exit 0
/// if it cannot be found — this must happen in the child itself so the
/// parent's `spawn()` never observes an exec failure as a spawn error.
fn exec_or_not_found(argv: &[String]) -> std::io::Result<()> {
    let cstrings: Vec<CString> = argv
        .iter()
        .map(|s| cstring(s))
        .collect::<std::io::Result<_>>()?;
    let mut c_argv: Vec<*const libc::c_char> = cstrings.iter().map(|c| c.as_ptr()).collect();
    c_argv.push(std::ptr::null());

    unsafe {
        libc::execvp(c_argv[0], c_argv.as_ptr());
    }

    println!("{}: command not found", argv[0]);
    std::process::exit(0);
}
