//! Process/job data model and the job table.
//!
//! `Process` and `Job` mirror the original C `struct process`/`struct job`
//! pair, with the intrusive `next` pointer replaced by an owned `Vec<Process>`
//! on the job (the pipeline is a small, fixed-size, single-owner sequence —
//! there is no reason to pay for a linked list). `JobTable` replaces the raw
//! `jobs[256]` array with a fixed-capacity slot vector; a job id is never the
//! same thing as a slot index.

use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{tcsetpgrp, Pid};

use crate::error::{ShellError, ShellResult};

pub const MAX_JOBS: usize = 256;

#[derive(Debug, Clone)]
pub struct Process {
    pub name: String,
    pub argv: Vec<String>,
    pub pid: Option<Pid>,
    pub status: Option<WaitStatus>,
    pub stopped: bool,
    pub completed: bool,
}

impl Process {
    pub fn new(argv: Vec<String>) -> Self {
        let name = argv.first().cloned().unwrap_or_default();
        Process {
            name,
            argv,
            pid: None,
            status: None,
            stopped: false,
            completed: false,
        }
    }

    fn mark(&mut self, status: WaitStatus) {
        self.status = Some(status);
        match status {
            WaitStatus::Exited(..) => {
                self.completed = true;
            }
            WaitStatus::Signaled(pid, sig, _) => {
                self.completed = true;
                eprintln!("{}: Terminated by signal {}.", pid, sig as i32);
            }
            WaitStatus::Stopped(..) => {
                self.stopped = true;
            }
            WaitStatus::Continued(..) => {
                self.stopped = false;
            }
            _ => {}
        }
    }
}

pub struct Job {
    pub id: u32,
    pub pgid: Pid,
    pub processes: Vec<Process>,
    pub foreground: bool,
    pub tmodes: Option<Termios>,
    pub stdin: RawFd,
    pub stdout: RawFd,
    pub stderr: RawFd,
    pub dead: bool,
    pub command: String,
}

impl Job {
    pub fn new(id: u32, processes: Vec<Process>, foreground: bool, command: String) -> Self {
        Job {
            id,
            pgid: Pid::from_raw(0),
            processes,
            foreground,
            tmodes: None,
            stdin: libc::STDIN_FILENO,
            stdout: libc::STDOUT_FILENO,
            stderr: libc::STDERR_FILENO,
            dead: false,
            command,
        }
    }

    pub fn piped(&self) -> bool {
        self.processes.len() > 1
    }

    pub fn is_completed(&self) -> bool {
        self.processes.iter().all(|p| p.completed)
    }

    pub fn is_stopped(&self) -> bool {
        self.processes.iter().all(|p| p.completed || p.stopped)
    }

    fn mark_pid(&mut self, pid: Pid, status: WaitStatus) -> bool {
        match self.processes.iter_mut().find(|p| p.pid == Some(pid)) {
            Some(process) => {
                process.mark(status);
                true
            }
            None => false,
        }
    }

    fn refresh_dead(&mut self) {
        self.dead = self.is_completed();
    }

    /// Exit/signal status of this job's last stage, in shell `$?` form.
    pub fn last_status(&self) -> i32 {
        match self.processes.last().and_then(|p| p.status) {
            Some(WaitStatus::Exited(_, code)) => code,
            Some(WaitStatus::Signaled(_, sig, _)) => 128 + sig as i32,
            _ => 0,
        }
    }

    /// `<id>: <name> <args> | <name> <args> & ` display line for `jobs`.
    pub fn listing_line(&self) -> String {
        let mut line = format!("{}: ", self.id);
        for (i, process) in self.processes.iter().enumerate() {
            if i > 0 {
                line.push_str("| ");
            }
            line.push_str(&process.name);
            line.push(' ');
            for arg in process.argv.iter().skip(1) {
                line.push_str(arg);
                line.push(' ');
            }
        }
        line.push_str("& ");
        line
    }
}

/// Fixed-capacity slot array of jobs, matching the original `jobs[256]`.
pub struct JobTable {
    slots: Vec<Option<Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_JOBS);
        slots.resize_with(MAX_JOBS, || None);
        JobTable { slots }
    }

    /// Smallest job id not held by any live job (spec.md §3/§4.3): scan live
    /// jobs in slot order, counting ids from 1 up and returning the first gap.
    pub fn smallest_free_id(&self) -> u32 {
        let mut candidate = 1u32;
        loop {
            let taken = self
                .iterate_live()
                .any(|job| job.id == candidate);
            if !taken {
                return candidate;
            }
            candidate += 1;
        }
    }

    /// Highest id currently held by a live job, or 0 if none are live.
    pub fn largest_id(&self) -> u32 {
        self.iterate_live().map(|job| job.id).max().unwrap_or(0)
    }

    pub fn insert(&mut self, job: Job) -> Result<usize, io::Error> {
        let slot = self
            .slots
            .iter()
            .position(|slot| match slot {
                None => true,
                Some(job) => job.dead,
            })
            .ok_or_else(|| io::Error::other("wsh: too many jobs"))?;
        self.slots[slot] = Some(job);
        Ok(slot)
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Job> {
        self.iterate_live().find(|job| job.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: u32) -> Option<&mut Job> {
        self.slots
            .iter_mut()
            .flatten()
            .filter(|job| !job.dead)
            .find(|job| job.id == id)
    }

    /// Id of the most recently inserted live job: the highest occupied slot,
    /// per spec.md §9's resolution of the `fg`/`bg` "no id given" branch.
    /// Returns an id rather than a `&mut Job` so callers can name the job
    /// across a later, separate mutable borrow of the table.
    pub fn most_recent_id(&self) -> Option<u32> {
        self.iterate_live().map(|job| job.id).last()
    }

    pub fn iterate_live(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten().filter(|job| !job.dead)
    }

    /// Drains all ready children with non-blocking waits (spec.md §4.7). Each
    /// observed pid is matched against the job table; unknown pids produce a
    /// diagnostic rather than a panic. Safe to call from a plain function
    /// call in the main loop — this is not signal-handler context, only the
    /// `AtomicBool` flag that triggers it is set from one.
    pub fn reap_ready(&mut self) {
        loop {
            let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
            match waitpid(Pid::from_raw(-1), Some(flags)) {
                Ok(WaitStatus::StillAlive) => return,
                Err(Errno::ECHILD) => return,
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    warn!("reap event=wait error={}", err);
                    return;
                }
                Ok(status) => {
                    let pid = status_pid(status);
                    if self.mark_and_refresh(pid, status) {
                        debug!("reap event=mark pid={}", pid);
                    } else {
                        eprintln!("wsh: No child process {}.", pid);
                    }
                }
            }
        }
    }

    /// Scans every slot for the process owning `pid`, marks it from `status`,
    /// and refreshes its job's `dead` flag. Shared by `reap_ready` and
    /// `wait_for_job`: a wait call that targets "any child" can reap a pid
    /// belonging to a job other than the one it was waiting for, and that
    /// pid's status can never be observed again once the kernel has handed
    /// it over — so every wait path must update the whole table, not just
    /// the job it was called about.
    fn mark_and_refresh(&mut self, pid: Pid, status: WaitStatus) -> bool {
        match self.slots.iter_mut().flatten().find(|job| job.mark_pid(pid, status)) {
            Some(job) => {
                job.refresh_dead();
                true
            }
            None => false,
        }
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

fn status_pid(status: WaitStatus) -> Pid {
    match status {
        WaitStatus::Exited(pid, _)
        | WaitStatus::Signaled(pid, _, _)
        | WaitStatus::Stopped(pid, _)
        | WaitStatus::Continued(pid) => pid,
        WaitStatus::PtraceEvent(pid, _, _) | WaitStatus::PtraceSyscall(pid) => pid,
        WaitStatus::StillAlive => Pid::from_raw(0),
    }
}

/// Blocks until the job named `job_id` is completed or stopped, updating
/// each `Process`'s `stopped`/`completed` flags as children report in.
/// Mirrors `wait_for_job`'s split in the original: piped jobs wait on any
/// child (`WAIT_ANY`), single-stage jobs wait on the job's own pgid
/// specifically (spec.md §4.5).
///
/// Takes the whole `JobTable`, not just `job_id`'s `Job`: a piped job waits
/// on `-1` (any child), which can reap a pid belonging to some other live
/// job. That status can never be collected again once the kernel hands it
/// over, so every reaped pid is matched against the full table via
/// `mark_and_refresh`, exactly like the asynchronous reaper does — not just
/// checked against the job this call was waiting for.
pub fn wait_for_job(table: &mut JobTable, job_id: u32) -> ShellResult<()> {
    let wait_target = {
        let job = table
            .find_by_id(job_id)
            .ok_or_else(|| ShellError::job(format!("no such job {job_id}")))?;
        if job.piped() {
            Pid::from_raw(-1)
        } else {
            Pid::from_raw(-job.pgid.as_raw())
        }
    };
    loop {
        match waitpid(wait_target, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::StillAlive) => continue,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(err) => return Err(ShellError::from(err)),
            Ok(status) => {
                let pid = status_pid(status);
                if !table.mark_and_refresh(pid, status) {
                    eprintln!("wsh: No child process {}.", pid);
                }
            }
        }
        match table.find_by_id(job_id) {
            Some(job) if job.is_stopped() || job.is_completed() => break,
            Some(_) => continue,
            None => break,
        }
    }
    if let Some(job) = table.find_by_id_mut(job_id) {
        job.refresh_dead();
    }
    Ok(())
}

/// Grants the job's pgid the controlling terminal, sends `SIGCONT` if
/// resuming a stopped job, waits for it, then reclaims the tty for the shell
/// (spec.md §4.5, grounded on the original `put_job_in_foreground`).
pub fn put_job_in_foreground(
    table: &mut JobTable,
    job_id: u32,
    cont: bool,
    shell_pgid: Pid,
    shell_tmodes: &Termios,
) -> ShellResult<()> {
    let pgid = table
        .find_by_id(job_id)
        .map(|job| job.pgid)
        .ok_or_else(|| ShellError::job(format!("no such job {job_id}")))?;
    set_terminal_foreground(pgid)?;
    if cont {
        if let Some(job) = table.find_by_id_mut(job_id) {
            if let Some(ref tmodes) = job.tmodes {
                let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
                let _ = tcsetattr(fd, SetArg::TCSADRAIN, tmodes);
            }
        }
        if let Err(err) = kill(Pid::from_raw(-pgid.as_raw()), Signal::SIGCONT) {
            warn!("job event=cont pgid={} error={}", pgid, err);
        }
    }

    wait_for_job(table, job_id)?;

    set_terminal_foreground(shell_pgid)?;
    let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
    if let Ok(tmodes) = tcgetattr(fd) {
        if let Some(job) = table.find_by_id_mut(job_id) {
            job.tmodes = Some(tmodes);
        }
    }
    let _ = tcsetattr(fd, SetArg::TCSADRAIN, shell_tmodes);
    Ok(())
}

/// Sends a continue signal to the job's group without touching the tty or
/// waiting (spec.md §4.6, `put_job_in_background`).
pub fn put_job_in_background(job: &Job) -> ShellResult<()> {
    kill(Pid::from_raw(-job.pgid.as_raw()), Signal::SIGCONT)?;
    Ok(())
}

pub fn set_terminal_foreground(pgid: Pid) -> ShellResult<()> {
    let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
    match tcsetpgrp(fd, pgid) {
        Ok(()) => Ok(()),
        Err(Errno::ENOTTY) => Ok(()),
        Err(err) => Err(ShellError::from(err)),
    }
}

/// RAII guard installed by the signal-driven reaper to keep the `AtomicBool`
/// handoff reentrancy-safe (spec.md §4.7/§5): the real `SIGCHLD` disposition
/// only flips this flag; `JobTable::reap_ready` drains it from the main loop.
pub fn sigchld_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

pub fn take_sigchld(flag: &Arc<AtomicBool>) -> bool {
    flag.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc_named(name: &str) -> Process {
        Process::new(vec![name.to_string()])
    }

    #[test]
    fn smallest_free_id_fills_gaps() {
        let mut table = JobTable::new();
        table.insert(Job::new(1, vec![proc_named("a")], false, "a".into())).unwrap();
        table.insert(Job::new(2, vec![proc_named("b")], false, "b".into())).unwrap();
        table.find_by_id_mut(1).unwrap().dead = true;
        assert_eq!(table.smallest_free_id(), 1);
    }

    #[test]
    fn largest_id_is_zero_on_empty_table() {
        let table = JobTable::new();
        assert_eq!(table.largest_id(), 0);
    }

    #[test]
    fn largest_id_tracks_highest_live_job() {
        let mut table = JobTable::new();
        table.insert(Job::new(1, vec![proc_named("a")], false, "a".into())).unwrap();
        table.insert(Job::new(5, vec![proc_named("b")], false, "b".into())).unwrap();
        assert_eq!(table.largest_id(), 5);
    }

    #[test]
    fn insert_reuses_dead_slots() {
        let mut table = JobTable::new();
        for i in 0..MAX_JOBS {
            table
                .insert(Job::new(i as u32 + 1, vec![proc_named("a")], false, "a".into()))
                .unwrap();
        }
        assert!(table.insert(Job::new(999, vec![proc_named("a")], false, "a".into())).is_err());
        table.find_by_id_mut(1).unwrap().dead = true;
        assert!(table.insert(Job::new(999, vec![proc_named("a")], false, "a".into())).is_ok());
    }

    #[test]
    fn job_is_completed_only_when_every_process_is() {
        let mut job = Job::new(1, vec![proc_named("a"), proc_named("b")], true, "a | b".into());
        assert!(!job.is_completed());
        job.processes[0].completed = true;
        assert!(!job.is_completed());
        job.processes[1].completed = true;
        assert!(job.is_completed());
    }

    #[test]
    fn wait_for_process_group_exits_with_status() {
        use nix::unistd::{fork, ForkResult};
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)).unwrap();
                std::process::exit(3);
            }
            ForkResult::Parent { child } => {
                nix::unistd::setpgid(child, child).ok();
                let mut process = proc_named("sh");
                process.pid = Some(child);
                let mut job = Job::new(1, vec![process], true, "sh".into());
                job.pgid = child;
                let mut table = JobTable::new();
                table.insert(job).unwrap();
                wait_for_job(&mut table, 1).unwrap();
                let job = table.find_by_id(1).unwrap();
                assert!(job.is_completed());
                assert_eq!(job.last_status(), 3);
            }
        }
    }

    #[test]
    fn wait_for_job_also_marks_other_jobs_reaped_via_wait_any() {
        use nix::unistd::{fork, ForkResult};

        // A second, unrelated job whose only child exits before we ever ask
        // to wait on it directly.
        let other_child = match unsafe { fork() }.unwrap() {
            ForkResult::Child => std::process::exit(7),
            ForkResult::Parent { child } => child,
        };
        let mut other_process = proc_named("sh");
        other_process.pid = Some(other_child);
        let mut other_job = Job::new(1, vec![other_process], false, "sh".into());
        other_job.pgid = other_child;

        let mut table = JobTable::new();
        table.insert(other_job).unwrap();

        // A piped job: `wait_for_job` waits on `-1` (any child) for this
        // one, which is exactly the path that can reap `other_child`'s
        // status before either of this job's own stages.
        let stage_pids: Vec<Pid> = (0..2)
            .map(|_| match unsafe { fork() }.unwrap() {
                ForkResult::Child => std::process::exit(0),
                ForkResult::Parent { child } => child,
            })
            .collect();
        let stages: Vec<Process> = stage_pids
            .iter()
            .map(|&pid| {
                let mut process = proc_named("sh");
                process.pid = Some(pid);
                process
            })
            .collect();
        let mut piped_job = Job::new(2, stages, false, "sh | sh".into());
        piped_job.pgid = stage_pids[0];
        table.insert(piped_job).unwrap();

        wait_for_job(&mut table, 2).unwrap();

        assert!(table.find_by_id(2).unwrap().is_completed());
        // Without cross-job matching, `other_child`'s status would have been
        // consumed by the `waitpid(-1, ...)` loop above and discarded,
        // leaving job 1 live forever.
        assert!(table.find_by_id(1).unwrap().is_completed());
    }

    #[test]
    fn listing_line_has_trailing_space_before_ampersand() {
        let process = Process::new(vec!["sleep".to_string(), "5".to_string()]);
        let job = Job::new(1, vec![process], false, "sleep 5".into());
        assert_eq!(job.listing_line(), "1: sleep 5 & ");
    }
}
