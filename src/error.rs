//! Error types for the shell.
//!
//! Built-in misuse and `chdir` failures use the exact message forms the
//! external interface specifies and are printed directly rather than routed
//! through `ShellError`. Everything in the launcher and job-control paths
//! that can fail — `fork`, `pipe`, `waitpid`, `tcsetpgrp`, `kill` — returns
//! `ShellResult` instead, since those are the paths where a typed error
//! actually needs to cross a module boundary.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Syntax error while splitting a line into stages.
    Parse,
    /// Job-control setup or bookkeeping failure (fork, pipe, wait, tty).
    Job,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Parse => write!(f, "parse error"),
            ErrorKind::Job => write!(f, "job error"),
            ErrorKind::Io => write!(f, "io error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ShellError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ShellError {
            kind,
            message: message.into(),
        }
    }

    pub fn job(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Job, message)
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ShellError {}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::new(ErrorKind::Io, err.to_string())
    }
}

impl From<nix::Error> for ShellError {
    fn from(err: nix::Error) -> Self {
        ShellError::job(err.to_string())
    }
}

pub type ShellResult<T> = Result<T, ShellError>;
