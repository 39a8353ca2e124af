use crate::error::{Error, Result};
use crate::handler::ErrorHandlerMap;
use crate::work::Work;

/// UniversalInvoker runs a unit of work once, sync or async alike, and lets the handler map turn a
/// failure into a value. Unhandled failures are propagated unchanged.
#[derive(Debug, Clone)]
pub struct UniversalInvoker<U> {
    error_map: ErrorHandlerMap<U>,
}

impl<U> Default for UniversalInvoker<U> {
    fn default() -> Self {
        Self {
            error_map: ErrorHandlerMap::default(),
        }
    }
}

impl<U> UniversalInvoker<U>
where
    U: Send + 'static,
{
    pub fn new(error_map: ErrorHandlerMap<U>) -> Self {
        Self { error_map }
    }

    pub async fn invoke<A>(&self, work: &Work<A, U>, arg: A) -> Result<U>
    where
        A: Send + 'static,
    {
        match work.run(arg).await {
            Ok(value) => Ok(value),
            Err(e) => recover(Error::Work(e), &self.error_map),
        }
    }
}

/// Replaces the failure with the result of the matching handler, if there is one.
pub(crate) fn recover<U>(error: Error, error_map: &ErrorHandlerMap<U>) -> Result<U> {
    match error_map.handle(&error) {
        Some(value) => Ok(value),
        None => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use thiserror::Error;

    use super::*;
    use crate::error::BoxError;

    #[derive(Debug, Error)]
    #[error("bad input {0}")]
    struct BadInput(i32);

    #[tokio::test]
    async fn test_sync_and_async_work() {
        let invoker = UniversalInvoker::default();

        let sync_work = Work::from_fn(|x: i32| Ok::<_, BoxError>(x + 1));
        assert_eq!(invoker.invoke(&sync_work, 1).await.unwrap(), 2);

        let async_work = Work::new(|x: i32| async move { Ok::<_, BoxError>(x * 10) });
        assert_eq!(invoker.invoke(&async_work, 2).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_failure_propagates_unchanged() {
        let invoker = UniversalInvoker::default();
        let work = Work::from_fn(|x: i32| Err::<i32, _>(BadInput(x)));

        let err = invoker.invoke(&work, 7).await.unwrap_err();
        match err {
            Error::Work(source) => assert_eq!(source.downcast_ref::<BadInput>().unwrap().0, 7),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handler_replaces_failure() {
        let invoker = UniversalInvoker::new(ErrorHandlerMap::new().on(|e: &BadInput| -e.0));
        let work = Work::from_fn(|x: i32| Err::<i32, _>(BadInput(x)));
        assert_eq!(invoker.invoke(&work, 3).await.unwrap(), -3);

        let unhandled = Work::from_fn(|_: i32| Err::<i32, _>(std::io::Error::other("io")));
        assert!(invoker.invoke(&unhandled, 3).await.is_err());
    }
}
