use tokio::time::sleep;

use crate::config::InvocationOptions;
use crate::error::{Error, Result};
use crate::fanout::retry_each;
use crate::outcome::Outcome;
use crate::work::Work;

/// ParallelInvoker runs several distinct units of work concurrently, either all with the same
/// argument or each with its own. Results are returned in the order of `works`.
#[derive(Debug, Clone)]
pub struct ParallelInvoker<U> {
    options: InvocationOptions<U>,
}

impl<U> ParallelInvoker<U>
where
    U: Clone + Send + Sync + 'static,
{
    pub fn new(options: InvocationOptions<U>) -> Self {
        Self { options }
    }

    /// Invokes every unit of work with a clone of `arg`.
    pub async fn invoke<A>(&self, works: &[Work<A, U>], arg: A) -> Result<Vec<Outcome<U>>>
    where
        A: Clone + Send + 'static,
    {
        self.options.validate()?;
        self.delay().await;
        let pairs = works.iter().cloned().zip(std::iter::repeat(arg));
        retry_each(&self.options, pairs).await
    }

    /// Invokes `works[i]` with `args[i]`. Both must have the same length.
    pub async fn invoke_each<A>(
        &self,
        works: &[Work<A, U>],
        args: Vec<A>,
    ) -> Result<Vec<Outcome<U>>>
    where
        A: Clone + Send + 'static,
    {
        self.options.validate()?;
        if works.len() != args.len() {
            return Err(Error::Config(format!(
                "got {} units of work but {} arguments",
                works.len(),
                args.len()
            )));
        }
        self.delay().await;
        let pairs = works.iter().cloned().zip(args);
        retry_each(&self.options, pairs).await
    }

    async fn delay(&self) {
        if !self.options.initial_delay.is_zero() {
            sleep(self.options.initial_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use thiserror::Error;
    use tokio::time::Instant;

    use super::*;
    use crate::error::{BoxError, ErrorKind};
    use crate::handler::ErrorHandlerMap;

    #[derive(Debug, Error)]
    #[error("unavailable")]
    struct Unavailable;

    fn after(ms: u64, f: fn(i32) -> i32) -> Work<i32, i32> {
        Work::new(move |x: i32| async move {
            sleep(Duration::from_millis(ms)).await;
            Ok::<_, BoxError>(f(x))
        })
    }

    fn values(outcomes: Vec<Outcome<i32>>) -> Vec<i32> {
        outcomes.into_iter().map(Outcome::into_value).collect()
    }

    #[tokio::test]
    async fn test_shared_argument_in_work_order() {
        let works = vec![after(30, |x| x + 1), after(0, |x| x * 10), after(15, |x| -x)];
        let invoker = ParallelInvoker::new(InvocationOptions::default());

        let outcomes = invoker.invoke(&works, 4).await.unwrap();
        assert_eq!(values(outcomes), vec![5, 40, -4]);
    }

    #[tokio::test]
    async fn test_runs_concurrently() {
        let works = vec![after(40, |x| x), after(40, |x| x), after(40, |x| x)];
        let invoker = ParallelInvoker::new(InvocationOptions::default());

        let start = Instant::now();
        invoker.invoke(&works, 1).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_argument_per_work() {
        let works = vec![after(10, |x| x + 1), after(0, |x| x * 2)];
        let invoker = ParallelInvoker::new(InvocationOptions::default());

        let outcomes = invoker.invoke_each(&works, vec![1, 2]).await.unwrap();
        assert_eq!(values(outcomes), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_length_mismatch_runs_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cloned_calls = Arc::clone(&calls);
        let work = Work::from_fn(move |x: i32| {
            cloned_calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BoxError>(x)
        });
        let invoker = ParallelInvoker::new(InvocationOptions::default());

        let err = invoker
            .invoke_each(&[work.clone(), work], vec![1])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_and_error_map_per_work() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cloned_calls = Arc::clone(&calls);
        let flaky = Work::from_fn(move |x: i32| {
            if cloned_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err::<i32, BoxError>(Box::new(std::io::Error::other("reset")))
            } else {
                Ok(x)
            }
        });
        let down = Work::from_fn(|_: i32| Err::<i32, _>(Unavailable));
        let invoker = ParallelInvoker::new(
            InvocationOptions::new()
                .with_retries(1)
                .with_verbose_retry(false)
                .with_error_map(ErrorHandlerMap::new().on(|_: &Unavailable| -1)),
        );

        let outcomes = invoker.invoke(&[flaky, down], 9).await.unwrap();
        assert_eq!(values(outcomes), vec![9, -1]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_works() {
        let invoker = ParallelInvoker::new(InvocationOptions::<i32>::default());
        let works: &[Work<i32, i32>] = &[];
        let outcomes = invoker.invoke(works, 1).await.unwrap();
        assert!(outcomes.is_empty());
    }
}
