use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::InvocationOptions;
use crate::error::{Error, Result};
use crate::list::{Inputs, ListInvoker};
use crate::outcome::Outcome;
use crate::postprocess::{Element, Postprocess};
use crate::work::Work;

/// BatchInvoker splits the inputs into contiguous batches of at most `batch_size` elements and
/// processes them one at a time with [`ListInvoker`] semantics.
///
/// The returned stream is lazy: a batch is started only when the stream is polled for it, and the
/// next batch is not built until the previous one has been yielded. `retry_timeout` bounds each
/// batch as a whole instead of each element. The stream ends after the first failed batch.
///
/// One `BatchInvoker` can be configured once and invoked many times.
#[derive(Debug, Clone)]
pub struct BatchInvoker<U> {
    options: InvocationOptions<U>,
    batch_size: usize,
}

impl<U> BatchInvoker<U>
where
    U: Clone + Send + Sync + 'static,
{
    pub fn new(options: InvocationOptions<U>, batch_size: usize) -> Self {
        Self {
            options,
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn invoke<A>(
        &self,
        inputs: impl Into<Inputs<A>>,
        work: &Work<A, U>,
    ) -> Result<BoxStream<'static, Result<Vec<Outcome<U>>>>>
    where
        A: Clone + Send + 'static,
    {
        self.stream(inputs.into(), work)
    }

    /// Same as [`Self::invoke`] for inputs that may nest or hold nulls. Nested inputs are flattened
    /// and nulls dropped before chunking, and `postprocess` runs on every batch's results.
    pub fn invoke_with<A>(
        &self,
        inputs: impl Into<Inputs<A>>,
        work: &Work<A, U>,
        postprocess: &Postprocess,
    ) -> Result<BoxStream<'static, Result<Vec<Outcome<U>>>>>
    where
        A: Clone + Send + Element + PartialEq + 'static,
        U: Element + PartialEq,
    {
        let inputs = Postprocess::new()
            .with_flatten(true)
            .with_dropna(true)
            .apply(inputs.into().into_vec());
        let postprocess = *postprocess;
        let batches = self.stream(Inputs::from(inputs), work)?;
        Ok(batches
            .map(move |batch| batch.map(|outcomes| postprocess.apply_outcomes(outcomes)))
            .boxed())
    }

    fn stream<A>(
        &self,
        inputs: Inputs<A>,
        work: &Work<A, U>,
    ) -> Result<BoxStream<'static, Result<Vec<Outcome<U>>>>>
    where
        A: Clone + Send + 'static,
    {
        if self.batch_size == 0 {
            return Err(Error::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        self.options.validate()?;

        let state = BatchState {
            inputs: inputs.into_iter(),
            batch_size: self.batch_size,
            list: ListInvoker::new(InvocationOptions {
                retry_timeout: None,
                ..self.options.clone()
            }),
            work: work.clone(),
            initial_delay: self.options.initial_delay,
            timeout: self.options.retry_timeout,
            error_msg: self.options.error_msg.clone(),
            index: 0,
            done: false,
        };

        Ok(stream::unfold(state, next_batch).boxed())
    }
}

struct BatchState<A, U> {
    inputs: std::vec::IntoIter<A>,
    batch_size: usize,
    list: ListInvoker<U>,
    work: Work<A, U>,
    initial_delay: Duration,
    timeout: Option<Duration>,
    error_msg: Option<String>,
    index: usize,
    done: bool,
}

async fn next_batch<A, U>(
    mut state: BatchState<A, U>,
) -> Option<(Result<Vec<Outcome<U>>>, BatchState<A, U>)>
where
    A: Clone + Send + 'static,
    U: Clone + Send + Sync + 'static,
{
    if state.done {
        return None;
    }
    let batch: Inputs<A> = state.inputs.by_ref().take(state.batch_size).collect();
    if batch.is_empty() {
        return None;
    }

    if state.index == 0 && !state.initial_delay.is_zero() {
        sleep(state.initial_delay).await;
    }

    debug!(batch = state.index, size = batch.len(), "Processing batch");
    let run = state.list.fan_out(batch, &state.work);
    let result = match state.timeout {
        None => run.await,
        Some(timeout) => match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                warn!(batch = state.index, ?timeout, "Batch timed out");
                Err(Error::Timeout {
                    message: state.error_msg.clone(),
                    timeout,
                })
            }
        },
    };

    state.index += 1;
    state.done = result.is_err();
    Some((result, state))
}
