//! Concurrent dispatch shared by the list, parallel and multi invokers.
//!
//! Each job is spawned on its own task tagged with its submission index. Completions arrive in any
//! order and are slotted back into submission order. The concurrency limit and the throttle are
//! created per call and dropped with it.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::config::InvocationOptions;
use crate::error::{Error, Result};
use crate::limit::ConcurrencyLimit;
use crate::outcome::Outcome;
use crate::retry::RetryingInvoker;
use crate::throttle::Throttle;
use crate::work::Work;

type Completion<T> = BoxFuture<'static, (usize, std::result::Result<Result<T>, JoinError>)>;

pub(crate) struct FanOut {
    limit: Option<ConcurrencyLimit>,
    throttle: Option<Throttle>,
}

impl FanOut {
    pub(crate) fn new<U>(options: &InvocationOptions<U>) -> Result<Self> {
        Ok(Self {
            limit: options.max_concurrent.map(ConcurrencyLimit::new).transpose()?,
            throttle: options.throttle_period.map(Throttle::new),
        })
    }

    /// Runs every job and returns their results in submission order. The first failure observed
    /// is returned; jobs still in flight at that point are detached, not aborted.
    pub(crate) async fn run<T, F>(&self, jobs: impl IntoIterator<Item = F>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut in_flight: FuturesUnordered<Completion<T>> = FuturesUnordered::new();
        let mut slots: Vec<Option<T>> = Vec::new();

        for (index, job) in jobs.into_iter().enumerate() {
            slots.push(None);

            let permit = match &self.limit {
                None => None,
                // keep collecting completions while waiting so a failure surfaces without waiting
                // for a free slot.
                Some(limit) => Some(loop {
                    tokio::select! {
                        biased;
                        Some((done, result)) = in_flight.next() => {
                            settle(&mut slots, done, result)?
                        }
                        permit = limit.acquire() => break permit?,
                    }
                }),
            };

            // spacing is measured between actual starts, after the permit is held
            if let Some(throttle) = &self.throttle {
                throttle.tick().await;
            }

            let handle = tokio::spawn(async move {
                let _permit = permit;
                job.await
            });
            in_flight.push(async move { (index, handle.await) }.boxed());
        }

        debug!(dispatched = slots.len(), "All units of work dispatched");
        while let Some((done, result)) = in_flight.next().await {
            settle(&mut slots, done, result)?;
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| Error::Internal(format!("no result for index {index}")))
            })
            .collect()
    }
}

fn settle<T>(
    slots: &mut [Option<T>],
    index: usize,
    result: std::result::Result<Result<T>, JoinError>,
) -> Result<()> {
    let value = match result {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            error!(index, error = %e, "Unit of work failed");
            return Err(e);
        }
        Err(e) => {
            error!(index, error = %e, "Unit of work panicked or was cancelled");
            return Err(e.into());
        }
    };

    match slots.get_mut(index) {
        Some(slot) => {
            *slot = Some(value);
            Ok(())
        }
        None => Err(Error::Internal(format!("result index {index} out of range"))),
    }
}

/// Runs every `(work, argument)` pair through a retrying invoker on a shared dispatch loop. The
/// caller has already validated `options` and spent the initial delay.
pub(crate) async fn retry_each<A, U>(
    options: &InvocationOptions<U>,
    pairs: impl IntoIterator<Item = (Work<A, U>, A)>,
) -> Result<Vec<Outcome<U>>>
where
    A: Clone + Send + 'static,
    U: Clone + Send + Sync + 'static,
{
    let fan_out = FanOut::new(options)?;
    let invoker = Arc::new(RetryingInvoker::new(options.per_element()));

    let jobs = pairs.into_iter().map(|(work, arg)| {
        let invoker = Arc::clone(&invoker);
        async move { invoker.run(&work, arg).await }
    });
    fan_out.run(jobs).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::{Instant, sleep};

    use super::*;

    fn options() -> InvocationOptions<u64> {
        InvocationOptions::default()
    }

    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let fan_out = FanOut::new(&options()).unwrap();
        let jobs = [30u64, 10, 20, 0].map(|ms| async move {
            sleep(Duration::from_millis(ms)).await;
            Ok::<_, Error>(ms)
        });

        assert_eq!(fan_out.run(jobs).await.unwrap(), vec![30, 10, 20, 0]);
    }

    #[tokio::test]
    async fn test_empty_jobs() {
        let fan_out = FanOut::new(&options()).unwrap();
        let jobs: Vec<BoxFuture<'static, Result<u64>>> = Vec::new();
        assert!(fan_out.run(jobs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limit_caps_in_flight_jobs() {
        let fan_out = FanOut::new(&options().with_max_concurrent(2)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6u64).map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Error>(i)
            }
        });

        assert_eq!(fan_out.run(jobs).await.unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_throttle_spaces_dispatch() {
        let fan_out =
            FanOut::new(&options().with_throttle_period(Duration::from_millis(20))).unwrap();
        let start = Instant::now();
        let jobs = (0..4u64).map(|i| async move { Ok::<_, Error>(i) });

        assert_eq!(fan_out.run(jobs).await.unwrap(), vec![0, 1, 2, 3]);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_failure_is_returned_and_siblings_detached() {
        let fan_out = FanOut::new(&options()).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));

        let jobs = (0..3u64).map(|i| {
            let finished = Arc::clone(&finished);
            async move {
                if i == 1 {
                    return Err(Error::Internal("boom".to_string()));
                }
                sleep(Duration::from_millis(30)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        });

        let err = fan_out.run(jobs).await.unwrap_err();
        assert_eq!(err.to_string(), "Internal Error - boom");

        sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_limit_is_a_config_error() {
        assert!(matches!(
            FanOut::new(&options().with_max_concurrent(0)),
            Err(Error::Config(_))
        ));
    }
}
