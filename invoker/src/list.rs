use tokio::time::sleep;

use crate::config::InvocationOptions;
use crate::error::{BoxError, Error, Result, WorkError};
use crate::fanout::retry_each;
use crate::outcome::Outcome;
use crate::postprocess::{Element, Postprocess};
use crate::work::Work;

/// Inputs is the collection a unit of work is fanned out over. A single value is a one element
/// collection, see [`Inputs::one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs<A>(Vec<A>);

impl<A> Inputs<A> {
    pub fn one(input: A) -> Self {
        Self(vec![input])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<A> {
        self.0
    }
}

impl<A> From<Vec<A>> for Inputs<A> {
    fn from(inputs: Vec<A>) -> Self {
        Self(inputs)
    }
}

impl<A, const N: usize> From<[A; N]> for Inputs<A> {
    fn from(inputs: [A; N]) -> Self {
        Self(Vec::from(inputs))
    }
}

impl<A> FromIterator<A> for Inputs<A> {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<A> IntoIterator for Inputs<A> {
    type Item = A;
    type IntoIter = std::vec::IntoIter<A>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// ListInvoker applies one unit of work to every input concurrently, with the retry, timeout and
/// error handling of [`crate::RetryingInvoker`] per element. Results come back in input order no
/// matter which element finishes first.
///
/// `max_concurrent` caps how many elements are in flight and `throttle_period` spaces out their
/// dispatch. `initial_delay` is spent once for the whole call. The first element that fails for
/// good fails the call; elements still running are left to finish on their own.
#[derive(Debug, Clone)]
pub struct ListInvoker<U> {
    options: InvocationOptions<U>,
}

impl<U> ListInvoker<U>
where
    U: Clone + Send + Sync + 'static,
{
    pub fn new(options: InvocationOptions<U>) -> Self {
        Self { options }
    }

    pub async fn invoke<A>(
        &self,
        inputs: impl Into<Inputs<A>>,
        work: &Work<A, U>,
    ) -> Result<Vec<Outcome<U>>>
    where
        A: Clone + Send + 'static,
    {
        self.options.validate()?;
        if !self.options.initial_delay.is_zero() {
            sleep(self.options.initial_delay).await;
        }
        self.fan_out(inputs.into(), work).await
    }

    /// Same as [`Self::invoke`], followed by `postprocess` on the ordered results.
    pub async fn invoke_with<A>(
        &self,
        inputs: impl Into<Inputs<A>>,
        work: &Work<A, U>,
        postprocess: &Postprocess,
    ) -> Result<Vec<Outcome<U>>>
    where
        A: Clone + Send + 'static,
        U: Element + PartialEq,
    {
        let outcomes = self.invoke(inputs, work).await?;
        Ok(postprocess.apply_outcomes(outcomes))
    }

    /// The fan-out without validation or initial delay.
    pub(crate) async fn fan_out<A>(
        &self,
        inputs: Inputs<A>,
        work: &Work<A, U>,
    ) -> Result<Vec<Outcome<U>>>
    where
        A: Clone + Send + 'static,
    {
        let pairs = inputs.into_iter().map(|arg| (work.clone(), arg));
        retry_each(&self.options, pairs).await
    }
}

/// Maps a synchronous function over `inputs` on the calling thread, in order and without retries,
/// then applies `postprocess`. The first failure is returned as [`Error::Work`].
pub fn map_sync<A, U, E, F>(
    inputs: impl Into<Inputs<A>>,
    mut f: F,
    postprocess: &Postprocess,
) -> Result<Vec<U>>
where
    F: FnMut(A) -> std::result::Result<U, E>,
    E: Into<BoxError>,
    U: Element + PartialEq,
{
    let values = inputs
        .into()
        .into_iter()
        .map(|input| f(input).map_err(|e| Error::Work(WorkError::new(e))))
        .collect::<Result<Vec<U>>>()?;
    Ok(postprocess.apply(values))
}
