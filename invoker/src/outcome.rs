use std::time::Duration;

/// The result of one successful invocation. Whether it carries the elapsed time is decided by the
/// caller's `retry_timing` option, never by the value itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<U> {
    Value(U),
    Timed { value: U, elapsed: Duration },
}

impl<U> Outcome<U> {
    pub(crate) fn new(value: U, elapsed: Duration, timed: bool) -> Self {
        if timed {
            Outcome::Timed { value, elapsed }
        } else {
            Outcome::Value(value)
        }
    }

    pub fn value(&self) -> &U {
        match self {
            Outcome::Value(value) | Outcome::Timed { value, .. } => value,
        }
    }

    pub fn into_value(self) -> U {
        match self {
            Outcome::Value(value) | Outcome::Timed { value, .. } => value,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Timed { elapsed, .. } => Some(*elapsed),
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, Outcome::Timed { .. })
    }

    pub fn map<V>(self, f: impl FnOnce(U) -> V) -> Outcome<V> {
        match self {
            Outcome::Value(value) => Outcome::Value(f(value)),
            Outcome::Timed { value, elapsed } => Outcome::Timed {
                value: f(value),
                elapsed,
            },
        }
    }
}
