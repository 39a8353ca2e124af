use std::time::Duration;

use backoff::retry::Retry;
use backoff::strategy::exponential::Exponential;
use tokio::time::{Instant, sleep};
use tracing::warn;

use crate::config::InvocationOptions;
use crate::error::{Error, ErrorKind, Result};
use crate::outcome::Outcome;
use crate::timed::race;
use crate::universal::recover;
use crate::work::Work;

/// RetryingInvoker runs a unit of work until it succeeds or `num_retries` retries are spent,
/// cooling off between attempts with a delay that grows by `backoff_factor`.
///
/// Timeouts count as ordinary failures. A failure the handler map recognizes ends the loop with
/// the handler's value. Once every attempt has failed, `retry_default` is returned when configured,
/// otherwise [`Error::RetriesExhausted`].
#[derive(Debug, Clone)]
pub struct RetryingInvoker<U> {
    options: InvocationOptions<U>,
}

impl<U> RetryingInvoker<U>
where
    U: Clone + Send + Sync + 'static,
{
    pub fn new(options: InvocationOptions<U>) -> Self {
        Self { options }
    }

    pub async fn invoke<A>(&self, work: &Work<A, U>, arg: A) -> Result<Outcome<U>>
    where
        A: Clone + Send + 'static,
    {
        self.options.validate()?;
        self.run(work, arg).await
    }

    /// The retry loop without option validation, for callers that validated once for many runs.
    pub(crate) async fn run<A>(&self, work: &Work<A, U>, arg: A) -> Result<Outcome<U>>
    where
        A: Clone + Send + 'static,
    {
        let options = &self.options;
        let start = Instant::now();
        if !options.initial_delay.is_zero() {
            sleep(options.initial_delay).await;
        }

        let total = options.num_retries + 1;
        let backoff =
            Exponential::new(options.retry_delay, options.backoff_factor).take(options.num_retries);

        let timeout = options.retry_timeout;
        let error_map = &options.error_map;
        let operation = move || {
            let arg = arg.clone();
            async move {
                race(work, arg, timeout)
                    .await
                    .or_else(|e| recover(e, error_map))
            }
        };

        let verbose = options.verbose_retry;
        let notify = move |error: &Error, attempt: usize, delay: Duration| {
            if verbose {
                warn!(?delay, %error, "Attempt {attempt}/{total} failed, retrying");
            }
        };

        let error = match Retry::with_notify(backoff, operation, can_retry, notify).await {
            Ok(value) => return Ok(Outcome::new(value, start.elapsed(), options.retry_timing)),
            Err(e) if e.kind() == ErrorKind::Configuration => return Err(e),
            Err(e) => e,
        };

        match &options.retry_default {
            Some(default) => Ok(Outcome::new(
                default.clone(),
                start.elapsed(),
                options.retry_timing,
            )),
            None => Err(Error::RetriesExhausted {
                message: options.error_msg.clone(),
                attempts: total,
                last: Box::new(error),
            }),
        }
    }
}

fn can_retry(error: &Error) -> bool {
    error.kind() != ErrorKind::Configuration
}
