use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, WorkError};

type FailureHandler<U> = Arc<dyn Fn(&WorkError) -> Option<U> + Send + Sync>;
type TimeoutHandler<U> = Arc<dyn Fn(Duration) -> U + Send + Sync>;

struct Entry<U> {
    type_id: TypeId,
    type_name: &'static str,
    handler: FailureHandler<U>,
}

impl<U> Clone for Entry<U> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// ErrorHandlerMap maps a failure kind to a handler whose result replaces the failure.
///
/// Work failures are matched by their concrete error type, timeouts by [`Self::on_timeout`]. At
/// most one handler fires per failure, the first registered one that matches.
///
/// ```
/// use invoker::ErrorHandlerMap;
///
/// let map = ErrorHandlerMap::<i64>::new()
///     .on(|_: &std::io::Error| -2)
///     .on_timeout(|_| -1);
/// assert!(!map.is_empty());
/// ```
pub struct ErrorHandlerMap<U> {
    entries: Vec<Entry<U>>,
    on_timeout: Option<TimeoutHandler<U>>,
}

impl<U> ErrorHandlerMap<U> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            on_timeout: None,
        }
    }

    /// Registers a handler for work failures of type `E`, replacing any earlier handler for `E`.
    pub fn on<E, F>(mut self, handler: F) -> Self
    where
        U: 'static,
        E: std::error::Error + 'static,
        F: Fn(&E) -> U + Send + Sync + 'static,
    {
        let handler: FailureHandler<U> =
            Arc::new(move |error: &WorkError| error.downcast_ref::<E>().map(&handler));
        let entry = Entry {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            handler,
        };

        match self.entries.iter_mut().find(|e| e.type_id == entry.type_id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Registers the handler for lost timeout races. It receives the configured timeout.
    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(Duration) -> U + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.on_timeout.is_none()
    }

    pub(crate) fn handle(&self, error: &Error) -> Option<U> {
        match error {
            Error::Timeout { timeout, .. } => self.on_timeout.as_ref().map(|h| h(*timeout)),
            Error::Work(source) | Error::Failed { source, .. } => self
                .entries
                .iter()
                .find_map(|entry| (entry.handler)(source)),
            Error::RetriesExhausted { last, .. } => self.handle(last),
            Error::Config(_) | Error::Internal(_) => None,
        }
    }
}

impl<U> Default for ErrorHandlerMap<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> Clone for ErrorHandlerMap<U> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            on_timeout: self.on_timeout.as_ref().map(Arc::clone),
        }
    }
}

impl<U> fmt::Debug for ErrorHandlerMap<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerMap")
            .field(
                "kinds",
                &self.entries.iter().map(|e| e.type_name).collect::<Vec<_>>(),
            )
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}
