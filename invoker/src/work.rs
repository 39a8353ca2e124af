//! A unit of work is a caller-supplied function, sync or async, normalized into one callable shape.
//!
//! Invoking a [`Work`] never blocks the caller: sync closures run lazily inside a ready future so
//! that the combinators can race, retry and fan them out exactly like async ones.
//!
//! There is no cancellation. When a timed invocation loses its race the running future is detached
//! and keeps going in the background; work that must stop early should carry its own cancellation
//! token.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{BoxError, WorkError};

type RunFn<A, U> = dyn Fn(A) -> BoxFuture<'static, Result<U, WorkError>> + Send + Sync;

/// Work is a cloneable handle to a function from `A` to `U`. Zero-argument work uses `A = ()`.
pub struct Work<A, U> {
    run: Arc<RunFn<A, U>>,
}

impl<A, U> Clone for Work<A, U> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<A, U> fmt::Debug for Work<A, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work").finish_non_exhaustive()
    }
}

impl<A, U> Work<A, U>
where
    A: Send + 'static,
    U: Send + 'static,
{
    /// Wraps an async function.
    pub fn new<F, Fut, E>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_run(move |arg| f(arg).map(|result| result.map_err(WorkError::new)).boxed())
    }

    /// Wraps a sync function. The function body runs when the returned future is first polled,
    /// not when the work is invoked.
    pub fn from_fn<F, E>(f: F) -> Self
    where
        F: Fn(A) -> Result<U, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let f = Arc::new(f);
        Self::from_run(move |arg| {
            let f = Arc::clone(&f);
            async move { f(arg).map_err(WorkError::new) }.boxed()
        })
    }

    pub(crate) fn from_run<F>(run: F) -> Self
    where
        F: Fn(A) -> BoxFuture<'static, Result<U, WorkError>> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Starts one invocation.
    pub fn run(&self, arg: A) -> BoxFuture<'static, Result<U, WorkError>> {
        (self.run)(arg)
    }

    /// Chains `next` onto the result of this work. A failure of either stage is the failure of the
    /// composed work and is passed through unchanged, so handler maps still match it by type.
    pub fn then<V>(self, next: Work<U, V>) -> Work<A, V>
    where
        V: Send + 'static,
    {
        Work::from_run(move |arg| {
            let first = self.run(arg);
            let next = next.clone();
            async move {
                let value = first.await?;
                next.run(value).await
            }
            .boxed()
        })
    }
}

impl<A, T> Work<A, Vec<T>>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Applies `f` to every item of the list this work returns.
    pub fn map_each<V, F>(self, f: F) -> Work<A, Vec<V>>
    where
        V: Send + 'static,
        F: Fn(T) -> V + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Work::from_run(move |arg| {
            let f = Arc::clone(&f);
            self.run(arg)
                .map(move |result| result.map(|items| items.into_iter().map(&*f).collect()))
                .boxed()
        })
    }
}
