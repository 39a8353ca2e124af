use futures::future::try_join_all;
use tokio::time::sleep;
use tracing::debug;

use crate::config::InvocationOptions;
use crate::error::{Error, Result};
use crate::fanout::retry_each;
use crate::list::{Inputs, ListInvoker};
use crate::outcome::Outcome;
use crate::postprocess::{Element, Postprocess};
use crate::work::Work;

/// Output of a [`MultiInvoker`] call. Values are bare; timing is never reported here.
#[derive(Debug, Clone, PartialEq)]
pub enum MultiOutput<U> {
    /// One value per input (broadcast) or per input and unit of work pair.
    Flat(Vec<U>),
    /// One list per unit of work, each covering every input.
    Exploded(Vec<Vec<U>>),
}

impl<U> MultiOutput<U> {
    pub fn into_flat(self) -> Option<Vec<U>> {
        match self {
            MultiOutput::Flat(values) => Some(values),
            MultiOutput::Exploded(_) => None,
        }
    }

    pub fn into_exploded(self) -> Option<Vec<Vec<U>>> {
        match self {
            MultiOutput::Flat(_) => None,
            MultiOutput::Exploded(lists) => Some(lists),
        }
    }
}

/// MultiInvoker combines inputs with one or more units of work.
///
/// * with `explode`, every unit of work is applied to all inputs, giving one list per unit of work.
/// * a single unit of work is broadcast over all inputs.
/// * otherwise inputs and units of work are paired by position and must have the same length.
///
/// Every shape is checked before anything is invoked.
#[derive(Debug, Clone)]
pub struct MultiInvoker<U> {
    options: InvocationOptions<U>,
    explode: bool,
}

enum Mode<'a, A, U> {
    Explode,
    Broadcast(&'a Work<A, U>),
    Paired,
}

impl<U> MultiInvoker<U>
where
    U: Clone + Send + Sync + 'static,
{
    pub fn new(options: InvocationOptions<U>) -> Self {
        Self {
            options: InvocationOptions {
                retry_timing: false,
                ..options
            },
            explode: false,
        }
    }

    pub fn with_explode(mut self, explode: bool) -> Self {
        self.explode = explode;
        self
    }

    pub async fn invoke<A>(
        &self,
        inputs: impl Into<Inputs<A>>,
        works: &[Work<A, U>],
    ) -> Result<MultiOutput<U>>
    where
        A: Clone + Send + 'static,
    {
        self.options.validate()?;
        let inputs = inputs.into();

        let mode = match works {
            [] => {
                return Err(Error::Config(
                    "at least one unit of work is required".to_string(),
                ));
            }
            _ if self.explode => Mode::Explode,
            [work] => Mode::Broadcast(work),
            _ if works.len() == inputs.len() => Mode::Paired,
            _ => {
                return Err(Error::Config(format!(
                    "Inputs and functions must be the same length, got {} inputs and {} functions",
                    inputs.len(),
                    works.len()
                )));
            }
        };

        if !self.options.initial_delay.is_zero() {
            sleep(self.options.initial_delay).await;
        }

        let list = ListInvoker::new(self.options.clone());
        match mode {
            Mode::Explode => {
                debug!(works = works.len(), inputs = inputs.len(), "Exploding");
                let lists = try_join_all(
                    works
                        .iter()
                        .map(|work| list.fan_out(inputs.clone(), work)),
                )
                .await?;
                Ok(MultiOutput::Exploded(
                    lists.into_iter().map(values).collect(),
                ))
            }
            Mode::Broadcast(work) => {
                let outcomes = list.fan_out(inputs, work).await?;
                Ok(MultiOutput::Flat(values(outcomes)))
            }
            Mode::Paired => {
                let pairs = works.iter().cloned().zip(inputs);
                let outcomes = retry_each(&self.options, pairs).await?;
                Ok(MultiOutput::Flat(values(outcomes)))
            }
        }
    }
}

impl<U> MultiInvoker<U>
where
    U: Clone + Send + Sync + Element + PartialEq + 'static,
{
    /// Same as [`Self::invoke`], followed by `postprocess` on the flat list or on every exploded
    /// list separately.
    pub async fn invoke_with<A>(
        &self,
        inputs: impl Into<Inputs<A>>,
        works: &[Work<A, U>],
        postprocess: &Postprocess,
    ) -> Result<MultiOutput<U>>
    where
        A: Clone + Send + 'static,
    {
        Ok(match self.invoke(inputs, works).await? {
            MultiOutput::Flat(values) => MultiOutput::Flat(postprocess.apply(values)),
            MultiOutput::Exploded(lists) => MultiOutput::Exploded(
                lists
                    .into_iter()
                    .map(|values| postprocess.apply(values))
                    .collect(),
            ),
        })
    }
}

fn values<U>(outcomes: Vec<Outcome<U>>) -> Vec<U> {
    outcomes.into_iter().map(Outcome::into_value).collect()
}
