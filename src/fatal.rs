//! A single helper for the fatal-error class of §7: a terminal/process-group
//! syscall failure, or a signal-send to a tracked job that cannot be
//! delivered. Mirrors `esh_sys_fatal_error` in the original source — print a
//! descriptive diagnostic and take the whole shell down with it.

pub fn fatal(message: &str) -> ! {
    eprintln!("esh: {message}");
    std::process::exit(1);
}
