use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error a unit of work may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The failure taxonomy. Timeouts and work failures are retried and can be intercepted by an
/// [`crate::ErrorHandlerMap`]; configuration errors are raised at call entry and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    WorkFailure,
    Configuration,
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The unit of work itself failed; the original failure is carried unchanged.
    #[error(transparent)]
    Work(WorkError),

    #[error("{}Timeout {} seconds exceeded", prefix(.message), .timeout.as_secs_f64())]
    Timeout {
        message: Option<String>,
        timeout: Duration,
    },

    /// A work failure surfaced by the timed invoker, decorated with the caller's message.
    #[error("{}", failed(.message, .source))]
    Failed {
        message: Option<String>,
        source: WorkError,
    },

    #[error("{}Operation failed after {attempts} attempts: {last}", prefix(.message))]
    RetriesExhausted {
        message: Option<String>,
        attempts: usize,
        #[source]
        last: Box<Error>,
    },

    #[error("Config Error - {0}")]
    Config(String),

    #[error("Internal Error - {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Work(_) | Error::Failed { .. } | Error::Internal(_) => ErrorKind::WorkFailure,
            Error::RetriesExhausted { last, .. } => last.kind(),
            Error::Config(_) => ErrorKind::Configuration,
        }
    }
}

fn prefix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!("{message} "),
        None => String::new(),
    }
}

fn failed(message: &Option<String>, source: &WorkError) -> String {
    match message {
        Some(message) => format!("{message} Error: {source}"),
        None => format!("An error occurred in async execution: {source}"),
    }
}

/// WorkError is the failure raised by a unit of work. It is cheap to clone so the same failure can
/// be logged, handed to a handler and kept as the last cause of a retry loop.
#[derive(Clone)]
pub struct WorkError(Arc<dyn std::error::Error + Send + Sync>);

impl WorkError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(Arc::from(error.into()))
    }

    /// Returns the underlying failure if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        (*self.0).downcast_ref::<E>()
    }

    pub fn is<E>(&self) -> bool
    where
        E: std::error::Error + 'static,
    {
        self.downcast_ref::<E>().is_some()
    }
}

impl fmt::Debug for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for WorkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Work(WorkError::new(e))
    }
}
