use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tokio::time::{Sleep, sleep};

use crate::{Condition, NoNotify, Notify, Operation};

/// To retry a Future with backoff, we maintain 2 states (which are Futures themselves).
/// These states track whether the [`Operation`] is [`RetryState::Running`] or cooling off via
/// [`RetryState::Sleeping`] as prescribed by the [`crate::strategy`]. The state-machine for retry
/// flips between these two states:
/// ```no_rust
///      (Pending)
///     /
/// (op)            (Ok) -> [Return(Ok)]*
///    \           /
///     (Ready) ---       (Non-retryable) -> [Return(Err)]*
///                \     /
///                 (Err)                            (None) -> [Return(Err)]*
///                      \                          /
///                       (Retryable) ---> (Backoff)          (Pending)
///                                                \        /
///                                         (Notify) (Sleep)
///                                                        \
///                                                         (Ready) --> [START(op)]
/// |------------------------------------|-------------------------|-----------------|
///           Operation                          Backoff             Operation(start)
///
/// ```
#[pin_project(project = RetryStateProj)]
enum RetryState<O>
where
    O: Operation,
{
    Running(#[pin] O::Future),
    Sleeping(#[pin] Sleep),
}

/// Retry retries an operation based on the backoff strategy.
#[pin_project]
pub struct Retry<I, O, C, N = NoNotify>
where
    O: Operation,
{
    #[pin]
    retry_state: RetryState<O>,
    backoff: I,
    operation: O,
    condition: C,
    notify: N,
    /// number of times the operation has been started.
    attempts: usize,
}

impl<I, O, C> Retry<I, O, C, NoNotify>
where
    I: Iterator<Item = Duration>,
    O: Operation,
    C: Condition<O::Error>,
{
    pub fn new<II: IntoIterator<IntoIter = I, Item = I::Item>>(
        backoff: II,
        operation: O,
        condition: C,
    ) -> Self {
        Self::with_notify(backoff, operation, condition, NoNotify)
    }
}

impl<I, O, C, N> Retry<I, O, C, N>
where
    I: Iterator<Item = Duration>,
    O: Operation,
    C: Condition<O::Error>,
    N: Notify<O::Error>,
{
    /// Same as [`Retry::new`] but calls `notify` before cooling off after every failed attempt.
    pub fn with_notify<II: IntoIterator<IntoIter = I, Item = I::Item>>(
        backoff: II,
        mut operation: O,
        condition: C,
        notify: N,
    ) -> Self {
        Self {
            retry_state: RetryState::Running(operation.run()),
            backoff: backoff.into_iter(),
            condition,
            operation,
            notify,
            attempts: 1,
        }
    }

    /// cools off before the next retry by doing a sleep on period determined by the backoff [`strategy`]
    fn cool_off(mut self: Pin<&mut Self>, err: O::Error) -> Result<(), O::Error> {
        let this = self.as_mut().project();
        match this.backoff.next() {
            // ran out of backoff, return the same error
            None => Err(err),
            Some(duration) => {
                this.notify.notify(&err, *this.attempts, duration);
                // sleep saturates a deadline past the end of time instead of overflowing
                self.as_mut()
                    .project()
                    .retry_state
                    .set(RetryState::Sleeping(sleep(duration)));
                Ok(())
            }
        }
    }

    /// reattempts to run the [`Operation`] again.
    fn reattempt(mut self: Pin<&mut Self>) {
        let future = {
            let this = self.as_mut().project();
            *this.attempts += 1;
            this.operation.run()
        };
        self.as_mut()
            .project()
            .retry_state
            .set(RetryState::Running(future));
    }
}

impl<I, O, C, N> Future for Retry<I, O, C, N>
where
    I: Iterator<Item = Duration>,
    O: Operation,
    C: Condition<O::Error>,
    N: Notify<O::Error>,
{
    type Output = Result<O::Item, O::Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.as_mut().project().retry_state.project() {
            RetryStateProj::Running(op) => match op.poll(cx) {
                Poll::Ready(Ok(item)) => Poll::Ready(Ok(item)),
                Poll::Ready(Err(e)) => {
                    if self.as_mut().condition.can_retry(&e) {
                        match self.as_mut().cool_off(e) {
                            Ok(_) => self.as_mut().poll(cx),
                            Err(e) => Poll::Ready(Err(e)),
                        }
                    } else {
                        Poll::Ready(Err(e))
                    }
                }
                Poll::Pending => Poll::Pending,
            },
            RetryStateProj::Sleeping(sleep) => match sleep.poll(cx) {
                Poll::Ready(_) => {
                    self.as_mut().reattempt();
                    self.poll(cx)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
