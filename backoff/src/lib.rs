//! Retry with backoff for async Rust.
//!
//! Given a Future, we have to run the Future to completion. If the Future returns an error,
//! we retry the Future after cooling off for the duration prescribed by a backoff [`strategy`].
//! Some errors are not worth retrying; for such cases we have [`Condition`]. Callers who want to
//! observe each failed attempt (e.g. to log it) plug in a [`Notify`].
//!
//! ```rust
//! use std::time::Duration;
//!
//! use backoff::retry::Retry;
//! use backoff::strategy::exponential::Exponential;
//!
//! async fn some_work() -> Result<u64, ()> {
//!     Ok(42)
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let backoff = Exponential::new(Duration::from_millis(1), 2.0).take(3);
//!     let result = Retry::new(backoff, some_work, |_: &()| true).await;
//!     assert_eq!(result, Ok(42));
//! }
//! ```

use std::future::Future;
use std::time::Duration;

/// strategy has the backoff strategies. A strategy is an iterator with Item=Duration and it
/// decides how long to cool off before the next attempt. Since it is an iterator, the number of
/// retries is bounded using [`take`](https://doc.rust-lang.org/std/iter/struct.Take.html).
pub mod strategy;

/// Conditional retry till we run out of backoff.
pub mod retry;

/// The retry condition depends on the result of [`Condition::can_retry`] function.
/// [`Condition::can_retry`] should return `true` to continue retrying or `false` to stop.
pub trait Condition<E> {
    fn can_retry(&self, error: &E) -> bool;
}

/// A fn pointer (Fn) can be passed which returns bool based on the error.
impl<E, F> Condition<E> for F
where
    F: Fn(&E) -> bool,
{
    fn can_retry(&self, error: &E) -> bool {
        self(error)
    }
}

/// An `Operation` is anything that returns a Future when executed and that
/// Future can be run to completion.
pub trait Operation {
    type Item;
    type Error;
    /// The [`Future`] returned when the Operation is called.
    type Future: Future<Output = Result<Self::Item, Self::Error>>;

    #[must_use = "futures do nothing unless you `.await` or poll them"]
    fn run(&mut self) -> Self::Future;
}

/// [`Operation`] for [`FnMut`] that returns a [`Future`] whose output is a [`Result`].
impl<T, E, R, F> Operation for F
where
    R: Future<Output = Result<T, E>>,
    F: FnMut() -> R,
{
    type Item = T;
    type Error = E;
    type Future = R;

    fn run(&mut self) -> Self::Future {
        self()
    }
}

/// `Notify` is invoked every time an attempt fails and another attempt is scheduled. `attempt` is
/// the 1-based number of the attempt that just failed and `delay` is the cool-off before the next
/// one.
pub trait Notify<E> {
    fn notify(&mut self, error: &E, attempt: usize, delay: Duration);
}

/// Notify that does nothing, used when the caller is not interested in failed attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotify;

impl<E> Notify<E> for NoNotify {
    fn notify(&mut self, _error: &E, _attempt: usize, _delay: Duration) {}
}

impl<E, F> Notify<E> for F
where
    F: FnMut(&E, usize, Duration),
{
    fn notify(&mut self, error: &E, attempt: usize, delay: Duration) {
        self(error, attempt, delay)
    }
}
