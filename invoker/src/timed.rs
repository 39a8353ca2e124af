use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::config::InvocationOptions;
use crate::error::{Error, Result};
use crate::outcome::Outcome;
use crate::work::Work;

/// Runs one invocation, racing it against `timeout` when one is given.
///
/// The raced invocation runs on its own task. When the timer wins, the task is detached rather than
/// aborted, so the work keeps running to completion in the background.
pub(crate) async fn race<A, U>(work: &Work<A, U>, arg: A, timeout: Option<Duration>) -> Result<U>
where
    A: Send + 'static,
    U: Send + 'static,
{
    let Some(timeout) = timeout else {
        return work.run(arg).await.map_err(Error::Work);
    };

    let handle = tokio::spawn(work.run(arg));
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result.map_err(Error::Work),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(Error::Timeout {
            message: None,
            timeout,
        }),
    }
}

/// TimedInvoker runs a unit of work once under an optional timeout and optionally reports how long
/// it took. Failures are either handled, suppressed, or decorated with the configured message.
#[derive(Debug, Clone)]
pub struct TimedInvoker<U> {
    options: InvocationOptions<U>,
}

impl<U> TimedInvoker<U>
where
    U: Clone + Send + Sync + 'static,
{
    pub fn new(options: InvocationOptions<U>) -> Self {
        Self { options }
    }

    pub async fn invoke<A>(&self, work: &Work<A, U>, arg: A) -> Result<Outcome<U>>
    where
        A: Send + 'static,
    {
        self.options.validate()?;

        let start = Instant::now();
        if !self.options.initial_delay.is_zero() {
            sleep(self.options.initial_delay).await;
        }

        let error = match race(work, arg, self.options.retry_timeout).await {
            Ok(value) => return Ok(self.outcome(value, start)),
            Err(e) => e,
        };

        if let Some(value) = self.options.error_map.handle(&error) {
            return Ok(self.outcome(value, start));
        }
        let suppressed = self.options.retry_default.as_ref();
        if let Some(default) = suppressed.filter(|_| self.options.suppress_err) {
            return Ok(self.outcome(default.clone(), start));
        }
        Err(describe(error, self.options.error_msg.clone()))
    }

    fn outcome(&self, value: U, start: Instant) -> Outcome<U> {
        Outcome::new(value, start.elapsed(), self.options.retry_timing)
    }
}

fn describe(error: Error, message: Option<String>) -> Error {
    match error {
        Error::Timeout { timeout, .. } => Error::Timeout { message, timeout },
        Error::Work(source) => Error::Failed { message, source },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use thiserror::Error;

    use super::*;
    use crate::error::BoxError;
    use crate::handler::ErrorHandlerMap;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    fn slow(delay: Duration) -> Work<(), i32> {
        Work::new(move |_: ()| async move {
            sleep(delay).await;
            Ok::<_, BoxError>(1)
        })
    }

    #[tokio::test]
    async fn test_value_and_timing() {
        let work = Work::from_fn(|x: i32| Ok::<_, BoxError>(x * 2));

        let plain = TimedInvoker::new(InvocationOptions::default());
        assert_eq!(plain.invoke(&work, 4).await.unwrap(), Outcome::Value(8));

        let timed = TimedInvoker::new(
            InvocationOptions::new()
                .with_retry_timing(true)
                .with_initial_delay(Duration::from_millis(20)),
        );
        let outcome = timed.invoke(&work, 4).await.unwrap();
        assert_eq!(outcome.value(), &8);
        assert!(outcome.elapsed().unwrap() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_timeout_error_message() {
        let invoker = TimedInvoker::new(
            InvocationOptions::new()
                .with_retry_timeout(Duration::from_millis(20))
                .with_error_msg("slow:"),
        );
        let err = invoker
            .invoke(&slow(Duration::from_secs(5)), ())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.to_string(), "slow: Timeout 0.02 seconds exceeded");
    }

    #[tokio::test]
    async fn test_timed_out_work_keeps_running() {
        let done = Arc::new(AtomicBool::new(false));
        let cloned_done = Arc::clone(&done);
        let work = Work::new(move |_: ()| {
            let done = Arc::clone(&cloned_done);
            async move {
                sleep(Duration::from_millis(50)).await;
                done.store(true, Ordering::SeqCst);
                Ok::<_, BoxError>(())
            }
        });

        let options = InvocationOptions::new().with_retry_timeout(Duration::from_millis(5));
        let invoker = TimedInvoker::new(options);
        assert!(invoker.invoke(&work, ()).await.is_err());
        assert!(!done.load(Ordering::SeqCst));

        sleep(Duration::from_millis(150)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_work_failure_message() {
        let work = Work::from_fn(|_: ()| Err::<i32, _>(DiskFull));

        let prefixed = TimedInvoker::new(InvocationOptions::new().with_error_msg("upload"));
        let err = prefixed.invoke(&work, ()).await.unwrap_err();
        assert_eq!(err.to_string(), "upload Error: disk full");

        let bare = TimedInvoker::new(InvocationOptions::default());
        let err = bare.invoke(&work, ()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "An error occurred in async execution: disk full"
        );
    }

    #[tokio::test]
    async fn test_suppress_err_returns_default() {
        let invoker = TimedInvoker::new(
            InvocationOptions::new()
                .with_suppress_err(true)
                .with_retry_default(-1)
                .with_retry_timeout(Duration::from_millis(10)),
        );
        let outcome = invoker
            .invoke(&slow(Duration::from_secs(5)), ())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Value(-1));

        let failing = Work::from_fn(|_: ()| Err::<i32, _>(DiskFull));
        assert_eq!(
            invoker.invoke(&failing, ()).await.unwrap(),
            Outcome::Value(-1)
        );
    }

    #[tokio::test]
    async fn test_handlers_win_over_suppression() {
        let invoker = TimedInvoker::new(
            InvocationOptions::new()
                .with_suppress_err(true)
                .with_retry_default(-1)
                .with_retry_timeout(Duration::from_millis(10))
                .with_error_map(
                    ErrorHandlerMap::new()
                        .on(|_: &DiskFull| -2)
                        .on_timeout(|_| -3),
                ),
        );

        let failing = Work::from_fn(|_: ()| Err::<i32, _>(DiskFull));
        assert_eq!(
            invoker.invoke(&failing, ()).await.unwrap(),
            Outcome::Value(-2)
        );
        assert_eq!(
            invoker
                .invoke(&slow(Duration::from_secs(5)), ())
                .await
                .unwrap(),
            Outcome::Value(-3)
        );
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let invoker = TimedInvoker::new(InvocationOptions::<i32>::new().with_suppress_err(true));
        let err = invoker.invoke(&slow(Duration::ZERO), ()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
