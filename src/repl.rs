//! The runner: reads one line at a time (interactively or from a batch
//! file), reaps any children the signal handler flagged, and dispatches
//! built-ins or launches a pipeline (spec.md §4's Runner + Reaper wiring).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use nix::sys::termios::Termios;
use nix::unistd::Pid;
use rustyline::DefaultEditor;

use crate::builtins::{execute_builtin, is_builtin};
use crate::io_helpers::read_input_line;
use crate::job_control::{take_sigchld, Job, JobTable, Process};
use crate::launcher::launch;
use crate::parse::parse_line;

pub struct ShellState {
    pub(crate) editor: Option<DefaultEditor>,
    pub(crate) jobs: JobTable,
    pub(crate) sigchld_flag: Arc<AtomicBool>,
    pub(crate) shell_pgid: Pid,
    pub(crate) shell_tmodes: Termios,
    pub(crate) last_status: i32,
    pub(crate) trace: bool,
}

/// `Some(())` to keep looping, `None` on end-of-input. Used by the
/// interactive loop; batch mode reads its lines up front and calls
/// `run_line` directly for each one.
pub fn run_once(state: &mut ShellState) -> std::io::Result<Option<()>> {
    let line = match read_input_line(&mut state.editor, "wsh> ")? {
        Some(line) => line,
        None => {
            println!("EOF");
            return Ok(None);
        }
    };
    run_line(state, &line)?;
    Ok(Some(()))
}

/// Processes one already-read line: reap, parse, dispatch. Shared by the
/// interactive loop and the batch-file reader.
pub fn run_line(state: &mut ShellState, line: &str) -> std::io::Result<()> {
    if take_sigchld(&state.sigchld_flag) {
        state.jobs.reap_ready();
    }

    let pipeline = parse_line(line.trim_end_matches(['\n', '\r']));
    if pipeline.stages.is_empty() {
        return Ok(());
    }

    if state.trace {
        eprintln!("trace: stages={:?} background={}", pipeline.stages, pipeline.background);
    }

    let first_arg = pipeline.stages[0].args[0].as_str();
    if !pipeline.background && !pipeline.piped() && is_builtin(Some(first_arg)) {
        execute_builtin(state, &pipeline.stages[0].args);
        return Ok(());
    }

    let display: Vec<String> = pipeline
        .stages
        .iter()
        .map(|stage| stage.args.join(" "))
        .collect();
    let display = display.join(" | ");

    let processes: Vec<Process> = pipeline
        .stages
        .into_iter()
        .map(|stage| Process::new(stage.args))
        .collect();

    let id = state.jobs.smallest_free_id();
    let job = Job::new(id, processes, !pipeline.background, display);
    if let Err(err) = state.jobs.insert(job) {
        eprintln!("wsh: {err}");
        return Ok(());
    }

    let job = state
        .jobs
        .find_by_id_mut(id)
        .expect("job was just inserted under this id");
    if let Err(err) = launch(job) {
        eprintln!("wsh: {err}");
        return Ok(());
    }

    let foreground = state.jobs.find_by_id(id).map(|job| job.foreground).unwrap_or(false);
    if foreground {
        if let Err(err) = crate::job_control::put_job_in_foreground(
            &mut state.jobs,
            id,
            false,
            state.shell_pgid,
            &state.shell_tmodes,
        ) {
            eprintln!("wsh: {err}");
        }
        state.last_status = state.jobs.find_by_id(id).map(|job| job.last_status()).unwrap_or(0);
    } else {
        state.last_status = 0;
    }

    Ok(())
}
