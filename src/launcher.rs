//! The launcher: forks a pipeline, wires pipes between stages, and hands the
//! resulting job to the foreground or background controller.
//!
//! Raw `fork`/`pipe`/`dup2`/`execvp` rather than `std::process::Command`: the
//! spec's tie-break for process-group assignment calls `setpgid` in both the
//! parent and the child (whichever runs first wins the race, the other is a
//! no-op), which needs to read as two plainly visible call sites. `pre_exec`
//! would hide the fork edge this crate's job-control model depends on.

use std::ffi::CString;
use std::os::fd::{IntoRawFd, RawFd};

use log::debug;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{close, dup2, execvp, fork, pipe, setpgid, ForkResult, Pid};

use crate::error::{ShellError, ShellResult};
use crate::job_control::{set_terminal_foreground, Job, Process};

/// Forks one child per stage of `job`, wiring pipes between consecutive
/// stages and the job's stdin/stdout/stderr at the ends, then hands the job
/// to the caller to run in the foreground or background (spec.md §4.4).
///
/// Pipe and fork failure are *not* the same policy (spec.md §7): a `pipe`
/// failure prints its diagnostic and terminates the whole shell with status
/// 1, exactly like the original's `perror("pipe"); exit(1);`
/// (examples/original_source/wsh.c:535-536). A `fork` failure only aborts
/// this one pipeline — it's reported back to the caller so the shell can
/// print its diagnostic and keep prompting.
pub fn launch(job: &mut Job) -> ShellResult<()> {
    let stage_count = job.processes.len();
    let mut infile: RawFd = job.stdin;

    for stage in 0..stage_count {
        let has_next = stage + 1 < stage_count;
        let (outfile, pipe_read_end): (RawFd, Option<RawFd>) = if has_next {
            match pipe() {
                Ok((read_end, write_end)) => {
                    (write_end.into_raw_fd(), Some(read_end.into_raw_fd()))
                }
                Err(err) => {
                    eprintln!("pipe: {err}");
                    std::process::exit(1);
                }
            }
        } else {
            (job.stdout, None)
        };

        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                run_child(
                    &job.processes[stage],
                    job.pgid,
                    job.foreground,
                    infile,
                    outfile,
                    job.stderr,
                );
                unreachable!("run_child always replaces the image or exits");
            }
            Ok(ForkResult::Parent { child }) => {
                job.processes[stage].pid = Some(child);
                if job.pgid.as_raw() == 0 {
                    job.pgid = child;
                }
                // Set in both parent and child: whichever runs first wins,
                // closing the race over which sees the assignment first.
                let _ = setpgid(child, job.pgid);
                debug!(
                    "launch event=fork stage={} pid={} pgid={}",
                    stage, child, job.pgid
                );
            }
            Err(err) => {
                eprintln!("fork: {err}");
                return Err(ShellError::job(format!("fork: {err}")));
            }
        }

        if infile != job.stdin {
            let _ = close(infile);
        }
        if outfile != job.stdout {
            let _ = close(outfile);
        }
        if let Some(read_end) = pipe_read_end {
            infile = read_end;
        }
    }

    Ok(())
}

/// Runs entirely inside the forked child. Never returns: either `execvp`
/// replaces the image, or the diagnostic-and-exit path terminates it.
fn run_child(
    process: &Process,
    pgid: Pid,
    foreground: bool,
    infile: RawFd,
    outfile: RawFd,
    errfile: RawFd,
) -> ! {
    let pgid = if pgid.as_raw() == 0 {
        Pid::this()
    } else {
        pgid
    };
    let _ = setpgid(Pid::from_raw(0), pgid);
    if foreground {
        let _ = set_terminal_foreground(pgid);
    }

    restore_default_dispositions();

    if infile != libc::STDIN_FILENO {
        let _ = dup2(infile, libc::STDIN_FILENO);
        let _ = close(infile);
    }
    if outfile != libc::STDOUT_FILENO {
        let _ = dup2(outfile, libc::STDOUT_FILENO);
        let _ = close(outfile);
    }
    if errfile != libc::STDERR_FILENO {
        let _ = dup2(errfile, libc::STDERR_FILENO);
        let _ = close(errfile);
    }

    let Ok(name) = CString::new(process.name.as_str()) else {
        std::process::exit(1);
    };
    let args: Vec<CString> = process
        .argv
        .iter()
        .filter_map(|arg| CString::new(arg.as_str()).ok())
        .collect();

    match execvp(&name, &args) {
        Ok(_) => unreachable!("execvp only returns on failure"),
        Err(_) => {
            eprintln!("execvp: {}: No such file or directory", process.name);
            // `_exit`, not `exit`: skip atexit handlers and stdio flushing
            // that belong to the parent shell, not this half-formed child.
            unsafe { libc::_exit(1) };
        }
    }
}

fn restore_default_dispositions() {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for &signal in &[
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGCHLD,
    ] {
        let _ = unsafe { sigaction(signal, &action) };
    }
}
