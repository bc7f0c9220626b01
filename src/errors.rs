//! Typed error hierarchy, one enum per subsystem, composed at the
//! orchestrator boundary. Hook callbacks never let their errors escape to
//! the runtime driving the assistant subprocess — see [`HookError`] and the
//! handling notes on each variant.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} could not be parsed, falling back to a fresh default")]
    Corrupt { path: PathBuf },
    #[error("could not resolve home directory for state storage")]
    NoHomeDirectory,
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write knowledge file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve project id: {0}")]
    ProjectId(String),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook classification failed: {0}")]
    Classification(String),
    #[error("build command failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("build command timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("reviewer session failed to start: {0}")]
    InitFailure(String),
    #[error("reviewer query failed: {0}")]
    QueryFailure(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn assistant process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("assistant stream produced unparseable output: {0}")]
    Decode(String),
    #[error("operator aborted the session")]
    UserAbort,
}

/// Top-level error the orchestrator surfaces to `main`. Every other
/// subsystem error folds in here via `#[from]`; `main` matches on
/// `UserAbort` specifically to choose exit code 130.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("operator aborted the workflow")]
    UserAbort,

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("fatal workflow error: {0}")]
    Fatal(String),
}

impl From<SessionError> for OrchestratorError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UserAbort => OrchestratorError::UserAbort,
            other => OrchestratorError::Fatal(other.to_string()),
        }
    }
}
