use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result, WorkError};
use crate::work::Work;

/// ConcurrencyLimit caps how many holders of a permit exist at once. Waiters are served in FIFO
/// order, and a permit is handed back when it is dropped.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimit {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Config(
                "concurrency limit must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("concurrency limit closed: {e}")))
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns work that holds a permit of this limit for the duration of every invocation.
    pub fn wrap<A, U>(&self, work: Work<A, U>) -> Work<A, U>
    where
        A: Send + 'static,
        U: Send + 'static,
    {
        let limit = self.clone();
        Work::from_run(move |arg| {
            let limit = limit.clone();
            let work = work.clone();
            async move {
                let _permit = limit.acquire().await.map_err(WorkError::new)?;
                work.run(arg).await
            }
            .boxed()
        })
    }
}
