mod builtins;
mod cli;
mod editor;
mod fatal;
mod jobs;
mod parser;
mod pipeline;
mod plugin;
mod reaper;
mod signals;
mod terminal;

use std::io::IsTerminal;

use editor::LineEditor;
use jobs::JobTable;
use plugin::PluginRegistry;
use terminal::TerminalController;

fn main() {
    let invocation = cli::parse();

    let mut registry = PluginRegistry::new();
    if let Some(dir) = &invocation.plugin_dir {
        registry.load_dir(dir);
    }

    reaper::init(JobTable::new());

    // The shell must not be stopped or killed by the job-control signals it
    // arbitrates for everyone else; children reset these to SIG_DFL before
    // exec (see pipeline::reset_child_dispositions).
    for signal in [libc::SIGTTOU, libc::SIGTTIN, libc::SIGTSTP, libc::SIGINT, libc::SIGQUIT] {
        signals::ignore(signal);
    }
    reaper::install_handler();

    let terminal = TerminalController::install();

    let shell_pgrp = unsafe {
        let pid = libc::getpid();
        if libc::setpgid(0, pid) != 0 {
            fatal::fatal("setpgid failed while placing the shell in its own process group");
        }
        pid
    };
    terminal.give_terminal_to(shell_pgrp, None);

    let mut editor = LineEditor::new();
    let is_interactive = std::io::stdin().is_terminal();

    loop {
        let prompt = if is_interactive {
            registry.build_prompt()
        } else {
            String::new()
        };

        let line = match editor.read_line(&prompt) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("esh: {e}");
                break;
            }
        };

        editor.add_to_history(&line);

        let Some(command_line) = parser::parse(&line) else {
            continue;
        };

        for pipeline in command_line {
            pipeline::launch(pipeline, &registry, &terminal, shell_pgrp);
        }
    }
}
