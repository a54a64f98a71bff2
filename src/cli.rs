//! Parses the shell's own invocation: `esh [-h] [-p <plugin-directory>]`.

use std::path::PathBuf;

pub struct Invocation {
    pub plugin_dir: Option<PathBuf>,
}

/// `-h` prints usage to standard output and exits 0. An unrecognized
/// flag, or a flag missing its value, is a fatal usage error: usage to
/// standard error, exit 2.
pub fn parse() -> Invocation {
    match try_parse() {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("esh: {e}");
            print_usage(&mut std::io::stderr());
            std::process::exit(2);
        }
    }
}

fn try_parse() -> Result<Invocation, lexopt::Error> {
    use lexopt::prelude::*;

    let mut plugin_dir = None;
    let mut parser = lexopt::Parser::from_env();

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                print_usage(&mut std::io::stdout());
                std::process::exit(0);
            }
            Short('p') | Long("plugin-dir") => {
                plugin_dir = Some(PathBuf::from(parser.value()?));
            }
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Invocation { plugin_dir })
}

fn print_usage(w: &mut dyn std::io::Write) {
    let _ = writeln!(w, "usage: esh [-h] [-p plugin-directory]");
}
