use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::work::Work;

/// Throttle spaces successive ticks at least `period` apart. It only limits how fast new work is
/// started, not how much of it is in flight.
#[derive(Debug, Clone)]
pub struct Throttle {
    period: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl Throttle {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits until `period` has passed since the previous tick. The first tick returns immediately.
    pub async fn tick(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let remaining = self.period.saturating_sub(previous.elapsed());
            if !remaining.is_zero() {
                sleep(remaining).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Returns work whose invocations start no closer than `period` to each other.
    pub fn wrap<A, U>(&self, work: Work<A, U>) -> Work<A, U>
    where
        A: Send + 'static,
        U: Send + 'static,
    {
        let throttle = self.clone();
        Work::from_run(move |arg| {
            let throttle = throttle.clone();
            let work = work.clone();
            async move {
                throttle.tick().await;
                work.run(arg).await
            }
            .boxed()
        })
    }
}
