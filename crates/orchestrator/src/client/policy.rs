//! Retry policy and per-call options for worker calls.

use std::time::Duration;

use rand::Rng;
use reqwest::Method;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(1500);
pub const EXPORT_BACKOFF_CAP: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const EXPORT_MAX_ATTEMPTS: u32 = 3;
pub const READ_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(25);

/// Which calls are retried, how often, and how long to wait in between.
///
/// Attempt `n` (0-indexed) waits `min(base * 2^n + jitter(0..=base), cap)`
/// before the next try. Because the jitter never exceeds `base`, consecutive
/// delays never decrease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retryable_methods: Vec<Method>,
    pub base_delay: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    /// Mutating calls: 5 attempts, 1.5s cap.
    pub fn mutating() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retryable_methods: vec![Method::POST, Method::PUT, Method::PATCH, Method::DELETE],
            base_delay: DEFAULT_BASE_DELAY,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }

    /// Reads get a single retry. Workers only expose `POST /process`, so a
    /// side-effect free call such as classification is a read even though
    /// it travels as POST.
    pub fn read() -> Self {
        Self {
            max_attempts: READ_MAX_ATTEMPTS,
            retryable_methods: vec![Method::GET, Method::HEAD, Method::POST],
            base_delay: DEFAULT_BASE_DELAY,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }

    /// Large payload calls: fewer attempts, longer cap.
    pub fn export() -> Self {
        Self {
            max_attempts: EXPORT_MAX_ATTEMPTS,
            backoff_cap: EXPORT_BACKOFF_CAP,
            ..Self::mutating()
        }
    }

    /// Exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            retryable_methods: Vec::new(),
            ..Self::mutating()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_backoff_cap(mut self, backoff_cap: Duration) -> Self {
        self.backoff_cap = backoff_cap;
        self
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.max_attempts > 1 && self.retryable_methods.contains(method)
    }

    /// Delay after 0-indexed attempt `attempt` for a given jitter.
    pub fn delay_for(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.base_delay.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.backoff_cap)
    }

    /// Delay after 0-indexed attempt `attempt` with random jitter in
    /// `0..=base_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=base_ms)
        };
        self.delay_for(attempt, Duration::from_millis(jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::mutating()
    }
}

/// Per-call settings handed to the worker client.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub method: Method,
    pub policy: RetryPolicy,
    /// Deadline for a single attempt.
    pub timeout: Duration,
}

impl CallOptions {
    pub fn mutating() -> Self {
        Self {
            method: Method::POST,
            policy: RetryPolicy::mutating(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn read() -> Self {
        Self {
            policy: RetryPolicy::read(),
            ..Self::mutating()
        }
    }

    pub fn export() -> Self {
        Self {
            policy: RetryPolicy::export(),
            ..Self::mutating()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.policy.allows(&self.method)
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::mutating()
    }
}
