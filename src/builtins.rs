//! Built-ins dispatcher: `exit`, `cd`, `jobs`, `fg`, `bg` (spec.md §4.2).
//!
//! Recognized on the first token of a non-piped, non-backgrounded stage
//! only; none of these fork.

mod job_cmds;

use std::env;

pub(crate) use job_cmds::{handle_bg, handle_fg};

use crate::repl::ShellState;

pub fn is_builtin(cmd: Option<&str>) -> bool {
    matches!(cmd, Some("exit" | "cd" | "jobs" | "fg" | "bg"))
}

/// Dispatches `argv` to the matching built-in. `argv[0]` must be one of the
/// names `is_builtin` recognizes.
pub(crate) fn execute_builtin(state: &mut ShellState, argv: &[String]) {
    match argv[0].as_str() {
        "exit" => handle_exit(),
        "cd" => handle_cd(state, argv),
        "jobs" => handle_jobs(state),
        "fg" => handle_fg(state, argv),
        "bg" => handle_bg(state, argv),
        _ => unreachable!("execute_builtin called with a non-builtin name"),
    }
}

fn handle_exit() {
    std::process::exit(0);
}

/// `cd` with no arguments goes to `$HOME` (spec.md §9's Open Question,
/// resolved in favor of the conventional shell behavior the original C left
/// unhandled).
fn handle_cd(state: &mut ShellState, argv: &[String]) {
    if argv.len() > 2 {
        println!("USAGE: cd dir");
        state.last_status = 1;
        return;
    }
    let target = if argv.len() == 2 {
        argv[1].clone()
    } else {
        env::var("HOME").unwrap_or_default()
    };
    match env::set_current_dir(&target) {
        Ok(()) => state.last_status = 0,
        Err(_) => {
            println!("Error: chdir to {target} failed.");
            state.last_status = 1;
        }
    }
}

/// Walks job ids 1..=largest in ascending order, printing only live
/// background jobs (spec.md §4.8).
fn handle_jobs(state: &mut ShellState) {
    let largest = state.jobs.largest_id();
    for id in 1..=largest {
        if let Some(job) = state.jobs.find_by_id(id) {
            if !job.foreground {
                println!("{}", job.listing_line());
            }
        }
    }
}
