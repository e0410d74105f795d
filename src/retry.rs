//! Retry policy (spec §4.3).
//!
//! Given a request's exception history, decides whether to retry and how
//! long to wait. Generalizes the teacher's [`Retry<E>`]-style yes/no wrapper
//! into a stateful policy object consulted by the executor every iteration.

use crate::errors::{Error, ErrorCode, ServiceError};
use crate::time::JITTER;
use std::time::Duration;

/// What the policy decided for one iteration of the executor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Consulted by the executor on every failed attempt. Implementations must
/// be cheap and side-effect free (beyond private internal counters).
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, ctx: &RetryContext) -> bool;
    fn delay(&self, ctx: &RetryContext) -> Duration;

    fn decide(&self, ctx: &RetryContext) -> Decision {
        if self.should_retry(ctx) {
            Decision::Retry {
                delay: self.delay(ctx),
            }
        } else {
            Decision::Fail
        }
    }
}

/// Everything the policy needs to decide, pulled off the `Request` by the
/// executor (spec §4.3 "Inputs per decision").
pub struct RetryContext<'a> {
    pub last_exception: &'a Error,
    pub prior_exception: Option<&'a Error>,
    pub retry_count: u32,
    pub remaining_timeout: Duration,
}

impl<'a> RetryContext<'a> {
    fn last_service_error(&self) -> Option<&ServiceError> {
        match self.last_exception {
            Error::Service(e) => Some(e),
            _ => None,
        }
    }

    fn prior_is_invalid_authorization(&self) -> bool {
        matches!(
            self.prior_exception,
            Some(Error::Service(e)) if e.code.is_invalid_authorization()
        )
    }
}

/// The default, fully-configurable retry policy described by spec §4.3.
#[derive(Debug, Clone)]
pub struct DefaultRetryPolicy {
    pub max_retry_attempts: u32,
    pub base_delay: Duration,
    pub control_base_delay: Duration,
    pub security_info_base_delay: Duration,
    pub security_info_constant_delay_retries: u32,
}

impl Default for DefaultRetryPolicy {
    fn default() -> Self {
        DefaultRetryPolicy {
            max_retry_attempts: 10,
            base_delay: Duration::from_secs(1),
            control_base_delay: Duration::from_secs(60),
            security_info_base_delay: Duration::from_secs(1),
            security_info_constant_delay_retries: 10,
        }
    }
}

impl DefaultRetryPolicy {
    /// Builds a policy, validating that `max_retry_attempts` is
    /// non-negative (it's unsigned, so this only documents the invariant)
    /// and the delays are positive.
    pub fn new(
        max_retry_attempts: u32,
        base_delay: Duration,
        control_base_delay: Duration,
        security_info_base_delay: Duration,
        security_info_constant_delay_retries: u32,
    ) -> Result<Self, Error> {
        if base_delay.is_zero() || control_base_delay.is_zero() || security_info_base_delay.is_zero()
        {
            return Err(Error::IllegalArgument(
                "retry policy delays must be positive".into(),
            ));
        }
        Ok(DefaultRetryPolicy {
            max_retry_attempts,
            base_delay,
            control_base_delay,
            security_info_base_delay,
            security_info_constant_delay_retries,
        })
    }

    fn exponential(retry_count: u32, base: Duration) -> Duration {
        // (1 << (retryCount-1)) * base + U(0, base)
        let shift = retry_count.saturating_sub(1).min(62);
        let multiplier = 1u64 << shift;
        let backoff = base.saturating_mul(multiplier as u32);
        backoff.saturating_add(JITTER.next_delay(base))
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, ctx: &RetryContext) -> bool {
        match ctx.last_exception {
            Error::Service(e) if e.code.is_control_op_throttling() => {
                ctx.remaining_timeout > self.control_base_delay
            }
            Error::Service(e) if e.code.is_security_info_not_ready() => true,
            Error::Network { retryable: true, .. } => true,
            Error::Service(e) if e.code.is_invalid_authorization() => {
                !ctx.prior_is_invalid_authorization()
            }
            Error::Service(e) if e.code.is_retryable() => ctx.retry_count < self.max_retry_attempts,
            _ => false,
        }
    }

    fn delay(&self, ctx: &RetryContext) -> Duration {
        match ctx.last_service_error().map(|e| e.code) {
            Some(code) if code.is_control_op_throttling() => {
                Self::exponential(ctx.retry_count, self.control_base_delay)
            }
            Some(code) if code.is_security_info_not_ready() => {
                if ctx.retry_count <= self.security_info_constant_delay_retries {
                    self.security_info_base_delay
                } else {
                    let excess = ctx.retry_count - self.security_info_constant_delay_retries;
                    Self::exponential(excess, self.security_info_base_delay)
                }
            }
            _ => Self::exponential(ctx.retry_count, self.base_delay),
        }
    }
}

/// A singleton policy that never retries and always returns a zero delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&self, _ctx: &RetryContext) -> bool {
        false
    }

    fn delay(&self, _ctx: &RetryContext) -> Duration {
        Duration::ZERO
    }
}

/// Chooses the `log` level for a retry notification the way
/// `neo4rs::graph::Graph::log_retry` does: longer delays are louder.
pub fn log_level_for_delay(delay: Duration) -> log::Level {
    match delay.as_millis() {
        0..=499 => log::Level::Debug,
        500..=4999 => log::Level::Info,
        _ => log::Level::Warn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use test_case::test_case;

    fn svc(code: ErrorCode) -> Error {
        Error::Service(ServiceError::new(code, "test"))
    }

    #[test]
    fn non_retryable_never_retries() {
        let policy = DefaultRetryPolicy::default();
        let err = svc(ErrorCode::TableNotFound);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count: 0,
            remaining_timeout: Duration::from_secs(100),
        };
        assert!(!policy.should_retry(&ctx));
    }

    #[test]
    fn throttling_stops_at_max_attempts() {
        let policy = DefaultRetryPolicy {
            max_retry_attempts: 3,
            ..Default::default()
        };
        let err = svc(ErrorCode::ReadThrottling);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count: 3,
            remaining_timeout: Duration::from_secs(100),
        };
        assert!(!policy.should_retry(&ctx));
    }

    #[test]
    fn invalid_authorization_retries_once_only() {
        let policy = DefaultRetryPolicy::default();
        let err = svc(ErrorCode::InvalidAuthorization);
        let prior = svc(ErrorCode::InvalidAuthorization);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: Some(&prior),
            retry_count: 1,
            remaining_timeout: Duration::from_secs(100),
        };
        assert!(!policy.should_retry(&ctx));

        let ctx2 = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count: 0,
            remaining_timeout: Duration::from_secs(100),
        };
        assert!(policy.should_retry(&ctx2));
    }

    #[test]
    fn security_info_not_ready_constant_then_exponential() {
        let policy = DefaultRetryPolicy::default();
        for count in 1..=policy.security_info_constant_delay_retries {
            let err = svc(ErrorCode::SecurityInfoNotReady);
            let ctx = RetryContext {
                last_exception: &err,
                prior_exception: None,
                retry_count: count,
                remaining_timeout: Duration::from_secs(100),
            };
            assert_eq!(policy.delay(&ctx), policy.security_info_base_delay);
        }

        let err = svc(ErrorCode::SecurityInfoNotReady);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count: policy.security_info_constant_delay_retries + 1,
            remaining_timeout: Duration::from_secs(100),
        };
        assert!(policy.delay(&ctx) >= policy.security_info_base_delay);
    }

    #[test_case(1 ; "first retry")]
    #[test_case(4 ; "fourth retry")]
    fn exponential_bounds(retry_count: u32) {
        let policy = DefaultRetryPolicy::default();
        let err = svc(ErrorCode::WriteThrottling);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count,
            remaining_timeout: Duration::from_secs(1000),
        };
        let delay = policy.delay(&ctx);
        let max = policy
            .base_delay
            .saturating_mul(1u32 << (retry_count - 1))
            .saturating_add(policy.base_delay);
        assert!(delay <= max);
    }

    #[test]
    fn control_op_throttling_respects_remaining_timeout() {
        let policy = DefaultRetryPolicy::default();
        let err = svc(ErrorCode::ControlOperationThrottling);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count: 1,
            remaining_timeout: Duration::from_secs(10),
        };
        assert!(!policy.should_retry(&ctx));

        let ctx2 = RetryContext {
            remaining_timeout: Duration::from_secs(120),
            ..ctx
        };
        assert!(policy.should_retry(&ctx2));
    }

    #[test]
    fn no_retry_policy_always_refuses() {
        let policy = NoRetryPolicy;
        let err = svc(ErrorCode::ReadThrottling);
        let ctx = RetryContext {
            last_exception: &err,
            prior_exception: None,
            retry_count: 0,
            remaining_timeout: Duration::from_secs(100),
        };
        assert_eq!(policy.decide(&ctx), Decision::Fail);
        assert_eq!(policy.delay(&ctx), Duration::ZERO);
    }
}
