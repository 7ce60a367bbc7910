use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

///////////////////////////////
/// Coarse classification of a stage failure, used by callers deciding whether a retry makes sense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DependencyMissing,
    InvalidInput,
    ProcessFailure,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::DependencyMissing => "dependency missing",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ProcessFailure => "process failure",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

///////////////////////////////
/// Errors raised by a pipeline stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Unable to find executable '{program}'. Is it installed and in PATH?")]
    DependencyMissing { program: String },

    #[error("Invalid input bundle: {0}")]
    InvalidInput(String),

    #[error("Command '{command}' failed on sample {sample_key}: {status}")]
    ProcessFailure {
        command: String,
        sample_key: String,
        status: String,
    },

    #[error("Could not spawn '{command}' for sample {sample_key}")]
    Spawn {
        command: String,
        sample_key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on output {path:?} for sample {sample_key}")]
    Io {
        path: PathBuf,
        sample_key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        StageError::InvalidInput(msg.into())
    }

    pub fn io(sample_key: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            sample_key: sample_key.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            StageError::InvalidInput(_) => ErrorKind::InvalidInput,
            StageError::ProcessFailure { .. } | StageError::Spawn { .. } => {
                ErrorKind::ProcessFailure
            }
            StageError::Io { .. } => ErrorKind::Io,
        }
    }
}
