//! Invocation combinators for async Rust.
//!
//! A unit of work ([`Work`]) is any sync or async function of one argument. The invokers run it
//! under a common set of [`InvocationOptions`]:
//!
//! - [`UniversalInvoker`] runs it once and lets an [`ErrorHandlerMap`] turn failures into values.
//! - [`TimedInvoker`] adds a timeout, timing and error decoration.
//! - [`RetryingInvoker`] retries with exponential backoff.
//! - [`ListInvoker`] fans one unit of work out over many inputs, keeping input order.
//! - [`BatchInvoker`] does the same in sequential batches, exposed as a lazy stream.
//! - [`ParallelInvoker`] runs many units of work on one argument or one argument each.
//! - [`MultiInvoker`] combines inputs with several units of work (broadcast, pairs or explode).
//!
//! ```
//! use std::time::Duration;
//!
//! use invoker::{BoxError, InvocationOptions, ListInvoker, Outcome, Work};
//!
//! #[tokio::main]
//! async fn main() -> invoker::Result<()> {
//!     let double = Work::new(|x: u64| async move { Ok::<_, BoxError>(x * 2) });
//!     let options = InvocationOptions::new()
//!         .with_retries(2)
//!         .with_retry_delay(Duration::from_millis(10))
//!         .with_max_concurrent(2);
//!
//!     let outcomes = ListInvoker::new(options).invoke([1, 2, 3], &double).await?;
//!     let values: Vec<u64> = outcomes.into_iter().map(Outcome::into_value).collect();
//!     assert_eq!(values, vec![2, 4, 6]);
//!     Ok(())
//! }
//! ```
//!
//! Nothing is ever cancelled. A unit of work that loses a timeout race, or whose siblings failed
//! the call, keeps running in the background until it finishes.

pub mod error;
pub use crate::error::{BoxError, Error, ErrorKind, Result, WorkError};

mod work;
pub use crate::work::Work;

mod outcome;
pub use crate::outcome::Outcome;

mod handler;
pub use crate::handler::ErrorHandlerMap;

pub mod config;
pub use crate::config::{InvocationOptions, RetryConfig};

/// Runs a unit of work once.
mod universal;
pub use crate::universal::UniversalInvoker;

/// Runs a unit of work once under a timeout.
mod timed;
pub use crate::timed::TimedInvoker;

/// Retry loop with exponential backoff.
mod retry;
pub use crate::retry::RetryingInvoker;

/// Standalone concurrency limit.
mod limit;
pub use crate::limit::ConcurrencyLimit;

/// Standalone dispatch throttle.
mod throttle;
pub use crate::throttle::Throttle;

mod fanout;

/// Flatten, drop-null and de-duplicate for list results.
mod postprocess;
pub use crate::postprocess::{Element, Postprocess};

/// One unit of work over many inputs.
pub mod list;
pub use crate::list::{Inputs, ListInvoker};

/// Sequential batches as a lazy stream.
mod batch;
pub use crate::batch::BatchInvoker;

mod parallel;
pub use crate::parallel::ParallelInvoker;

mod multi;
pub use crate::multi::{MultiInvoker, MultiOutput};
