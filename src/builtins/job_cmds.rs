//! `fg`/`bg` (spec.md §4.9).
//!
//! Both accept zero or one argument: a bare `%`-or-not job id, or none to
//! select the most recent live job. Bad arity prints a command-specific
//! `USAGE:` line — the original C prints `fg`'s usage text for both commands;
//! spec.md gives each its own wording, so this implementation does too.

use crate::job_control::put_job_in_foreground;
use crate::repl::ShellState;

fn parse_job_id(arg: Option<&String>) -> Result<Option<u32>, ()> {
    match arg {
        Some(value) => value
            .strip_prefix('%')
            .unwrap_or(value)
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ()),
        None => Ok(None),
    }
}

pub(crate) fn handle_fg(state: &mut ShellState, argv: &[String]) {
    if argv.len() > 2 {
        println!("USAGE: fg [job_id]");
        state.last_status = 1;
        return;
    }
    let Ok(id) = parse_job_id(argv.get(1)) else {
        println!("USAGE: fg [job_id]");
        state.last_status = 1;
        return;
    };

    let job_id = match id {
        Some(id) => state.jobs.find_by_id(id).map(|job| job.id),
        None => state.jobs.most_recent_id(),
    };
    let Some(job_id) = job_id else {
        // Selecting a non-existent id is a silent no-op (spec.md §4.9).
        return;
    };

    if let Some(job) = state.jobs.find_by_id_mut(job_id) {
        job.foreground = true;
    }
    match put_job_in_foreground(&mut state.jobs, job_id, true, state.shell_pgid, &state.shell_tmodes) {
        Ok(()) => {
            state.last_status = state.jobs.find_by_id(job_id).map(|job| job.last_status()).unwrap_or(0)
        }
        Err(err) => {
            eprintln!("fg: {err}");
            state.last_status = 1;
        }
    }
}

pub(crate) fn handle_bg(state: &mut ShellState, argv: &[String]) {
    if argv.len() > 2 {
        println!("USAGE: bg [job_id]");
        state.last_status = 1;
        return;
    }
    let Ok(id) = parse_job_id(argv.get(1)) else {
        println!("USAGE: bg [job_id]");
        state.last_status = 1;
        return;
    };

    let job_id = match id {
        Some(id) => state.jobs.find_by_id(id).map(|job| job.id),
        None => state.jobs.most_recent_id(),
    };
    let Some(job_id) = job_id else {
        return;
    };

    let Some(job) = state.jobs.find_by_id_mut(job_id) else {
        return;
    };
    job.foreground = false;
    if let Err(err) = crate::job_control::put_job_in_background(job) {
        eprintln!("bg: {err}");
        state.last_status = 1;
    } else {
        state.last_status = 0;
    }
}
