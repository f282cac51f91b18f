use std::env;
use std::io::IsTerminal;
use std::os::fd::BorrowedFd;
use std::sync::Arc;

use nix::sys::termios::tcgetattr;
use signal_hook::consts::signal::SIGCHLD;
use signal_hook::flag;

mod builtins;
mod error;
mod io_helpers;
mod job_control;
mod launcher;
mod parse;
mod repl;
mod signals;

use job_control::{sigchld_flag, JobTable};
use repl::{run_once, ShellState};
use signals::{init_session, install_signal_handlers};

fn main() {
    init_logging();

    let mut trace = false;
    let mut batch_file: Option<String> = None;
    for arg in env::args().skip(1) {
        if arg == "-x" || arg == "--trace" {
            trace = true;
        } else if batch_file.is_some() {
            eprintln!("Usage: ./wsh [batch_file]");
            std::process::exit(1);
        } else {
            batch_file = Some(arg);
        }
    }

    let interactive = batch_file.is_none() && std::io::stdin().is_terminal();

    if let Err(err) = install_signal_handlers() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    let shell_pgid = match init_session(interactive) {
        Ok(pgid) => pgid,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let shell_tmodes = {
        let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
        tcgetattr(fd).unwrap_or_else(|_| {
            eprintln!("error: failed to read terminal attributes");
            std::process::exit(1);
        })
    };

    let editor = if interactive {
        match rustyline::DefaultEditor::new() {
            Ok(editor) => Some(editor),
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let mut state = ShellState {
        editor,
        jobs: JobTable::new(),
        sigchld_flag: sigchld_flag(),
        shell_pgid,
        shell_tmodes,
        last_status: 0,
        trace,
    };

    if let Err(err) = flag::register(SIGCHLD, Arc::clone(&state.sigchld_flag)) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    if let Some(ref path) = batch_file {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("error: {path}: {err}");
                std::process::exit(1);
            }
        };
        run_batch(&mut state, &source);
        std::process::exit(0);
    }

    loop {
        match run_once(&mut state) {
            Ok(Some(())) => continue,
            Ok(None) => std::process::exit(0),
            Err(err) => eprintln!("error: {err}"),
        }
    }
}

fn run_batch(state: &mut ShellState, source: &str) {
    for line in source.lines() {
        if let Err(err) = repl::run_line(state, line) {
            eprintln!("error: {err}");
        }
    }
}

fn init_logging() {
    let env = env_logger::Env::default().filter_or("WSH_LOG", "info");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
