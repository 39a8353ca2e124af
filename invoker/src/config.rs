use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::handler::ErrorHandlerMap;

const DEFAULT_NUM_RETRIES: usize = 0;
const DEFAULT_INITIAL_DELAY: Duration = Duration::ZERO;
const DEFAULT_RETRY_DELAY: Duration = Duration::ZERO;
const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;
const DEFAULT_VERBOSE_RETRY: bool = true;

/// InvocationOptions is the option record shared by every invoker.
#[derive(Debug, Clone)]
pub struct InvocationOptions<U> {
    /// Attempts beyond the first.
    pub num_retries: usize,
    /// Suspension before the first attempt. Fan-out and batch calls apply it once per call.
    pub initial_delay: Duration,
    /// Delay before the first retry, multiplied by `backoff_factor` after every retry.
    pub retry_delay: Duration,
    pub backoff_factor: f64,
    /// Value returned instead of an error once every attempt has failed.
    pub retry_default: Option<U>,
    /// Per attempt deadline. A lost race is a timeout failure.
    pub retry_timeout: Option<Duration>,
    /// Return [`crate::Outcome::Timed`] instead of [`crate::Outcome::Value`].
    pub retry_timing: bool,
    /// Log every failed attempt that will be retried.
    pub verbose_retry: bool,
    /// For single timed invocations, substitute `retry_default` for any failure.
    pub suppress_err: bool,
    /// Prefix of the final error message.
    pub error_msg: Option<String>,
    pub error_map: ErrorHandlerMap<U>,
    pub max_concurrent: Option<usize>,
    /// Minimum gap between successive dispatches of a fan-out call.
    pub throttle_period: Option<Duration>,
}

impl<U> Default for InvocationOptions<U> {
    fn default() -> Self {
        Self {
            num_retries: DEFAULT_NUM_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retry_default: None,
            retry_timeout: None,
            retry_timing: false,
            verbose_retry: DEFAULT_VERBOSE_RETRY,
            suppress_err: false,
            error_msg: None,
            error_map: ErrorHandlerMap::default(),
            max_concurrent: None,
            throttle_period: None,
        }
    }
}

impl<U> InvocationOptions<U> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, num_retries: usize) -> Self {
        self.num_retries = num_retries;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_retry_default(mut self, retry_default: U) -> Self {
        self.retry_default = Some(retry_default);
        self
    }

    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = Some(retry_timeout);
        self
    }

    pub fn with_retry_timing(mut self, retry_timing: bool) -> Self {
        self.retry_timing = retry_timing;
        self
    }

    pub fn with_verbose_retry(mut self, verbose_retry: bool) -> Self {
        self.verbose_retry = verbose_retry;
        self
    }

    pub fn with_suppress_err(mut self, suppress_err: bool) -> Self {
        self.suppress_err = suppress_err;
        self
    }

    pub fn with_error_msg(mut self, error_msg: impl Into<String>) -> Self {
        self.error_msg = Some(error_msg.into());
        self
    }

    pub fn with_error_map(mut self, error_map: ErrorHandlerMap<U>) -> Self {
        self.error_map = error_map;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn with_throttle_period(mut self, throttle_period: Duration) -> Self {
        self.throttle_period = Some(throttle_period);
        self
    }

    /// Checks the invariants every invoker relies on. Called at entry of every invocation.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::Config(format!(
                "backoff_factor must be a finite number >= 1, got {}",
                self.backoff_factor
            )));
        }
        if self.max_concurrent == Some(0) {
            return Err(Error::Config(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.suppress_err && self.retry_default.is_none() {
            return Err(Error::Config(
                "suppress_err requires a retry_default".to_string(),
            ));
        }
        Ok(())
    }
}

impl<U: Clone> InvocationOptions<U> {
    /// The options every element of a fan-out call runs with. The initial delay has already been
    /// spent by the caller.
    pub(crate) fn per_element(&self) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            ..self.clone()
        }
    }
}

/// RetryConfig is the serialized form of the retry related options. Durations are in seconds.
///
/// ```
/// use invoker::{InvocationOptions, RetryConfig};
///
/// let config: RetryConfig =
///     serde_json::from_str(r#"{"num_retries": 3, "retry_delay": 0.5, "backoff_factor": 2}"#)
///         .unwrap();
/// let options = InvocationOptions::<String>::try_from(config).unwrap();
/// assert_eq!(options.num_retries, 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub num_retries: Option<usize>,
    pub initial_delay: Option<f64>,
    pub retry_delay: Option<f64>,
    pub backoff_factor: Option<f64>,
    pub retry_timeout: Option<f64>,
    pub retry_timing: Option<bool>,
    pub verbose_retry: Option<bool>,
    pub error_msg: Option<String>,
    pub max_concurrent: Option<usize>,
    pub throttle_period: Option<f64>,
}

fn seconds(name: &str, value: Option<f64>) -> Result<Option<Duration>> {
    value
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|e| {
                Error::Config(format!("{name} must be a non-negative number of seconds: {e}"))
            })
        })
        .transpose()
}

impl<U> TryFrom<RetryConfig> for InvocationOptions<U> {
    type Error = Error;

    fn try_from(config: RetryConfig) -> Result<Self> {
        let defaults = Self::default();
        let options = Self {
            num_retries: config.num_retries.unwrap_or(defaults.num_retries),
            initial_delay: seconds("initial_delay", config.initial_delay)?
                .unwrap_or(defaults.initial_delay),
            retry_delay: seconds("retry_delay", config.retry_delay)?
                .unwrap_or(defaults.retry_delay),
            backoff_factor: config.backoff_factor.unwrap_or(defaults.backoff_factor),
            retry_timeout: seconds("retry_timeout", config.retry_timeout)?,
            retry_timing: config.retry_timing.unwrap_or(defaults.retry_timing),
            verbose_retry: config.verbose_retry.unwrap_or(defaults.verbose_retry),
            error_msg: config.error_msg,
            max_concurrent: config.max_concurrent,
            throttle_period: seconds("throttle_period", config.throttle_period)?,
            ..defaults
        };
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = InvocationOptions::<i32>::default();
        assert_eq!(options.num_retries, 0);
        assert_eq!(options.initial_delay, Duration::ZERO);
        assert_eq!(options.backoff_factor, 1.0);
        assert!(options.verbose_retry);
        assert!(!options.retry_timing);
        assert!(options.error_map.is_empty());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let err = InvocationOptions::<i32>::new()
            .with_backoff_factor(0.5)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = InvocationOptions::<i32>::new()
            .with_backoff_factor(f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = InvocationOptions::<i32>::new()
            .with_max_concurrent(0)
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Config Error - max_concurrent must be greater than 0"
        );

        let err = InvocationOptions::<i32>::new()
            .with_suppress_err(true)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(
            InvocationOptions::new()
                .with_suppress_err(true)
                .with_retry_default(0)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_per_element_drops_initial_delay() {
        let options = InvocationOptions::<i32>::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_retries(2);
        let element = options.per_element();
        assert_eq!(element.initial_delay, Duration::ZERO);
        assert_eq!(element.num_retries, 2);
    }

    #[test]
    fn test_retry_config_from_json() {
        let config: RetryConfig = serde_json::from_str(
            r#"{
                "num_retries": 2,
                "initial_delay": 0.25,
                "retry_delay": 1,
                "backoff_factor": 1.5,
                "retry_timeout": 0.125,
                "retry_timing": true,
                "verbose_retry": false,
                "error_msg": "fetch:",
                "max_concurrent": 4,
                "throttle_period": 0.5
            }"#,
        )
        .unwrap();

        let options = InvocationOptions::<i32>::try_from(config).unwrap();
        assert_eq!(options.num_retries, 2);
        assert_eq!(options.initial_delay, Duration::from_millis(250));
        assert_eq!(options.retry_delay, Duration::from_secs(1));
        assert_eq!(options.backoff_factor, 1.5);
        assert_eq!(options.retry_timeout, Some(Duration::from_millis(125)));
        assert!(options.retry_timing);
        assert!(!options.verbose_retry);
        assert_eq!(options.error_msg.as_deref(), Some("fetch:"));
        assert_eq!(options.max_concurrent, Some(4));
        assert_eq!(options.throttle_period, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_retry_config_empty_is_default() {
        let config: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RetryConfig::default());

        let options = InvocationOptions::<i32>::try_from(config).unwrap();
        assert_eq!(options.num_retries, 0);
        assert_eq!(options.retry_timeout, None);
    }

    #[test]
    fn test_retry_config_rejects_bad_values() {
        let negative = RetryConfig {
            retry_delay: Some(-1.0),
            ..Default::default()
        };
        let err = InvocationOptions::<i32>::try_from(negative).unwrap_err();
        assert!(err.to_string().starts_with("Config Error - retry_delay"));

        let factor = RetryConfig {
            backoff_factor: Some(0.9),
            ..Default::default()
        };
        assert!(InvocationOptions::<i32>::try_from(factor).is_err());

        let unknown = serde_json::from_str::<RetryConfig>(r#"{"retries": 1}"#);
        assert!(unknown.is_err());
    }
}
