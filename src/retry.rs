//! Fixed-interval polling policy for endpoints that answer with a placeholder
//! until GitHub has finished computing the result.

use std::future::Future;
use std::time::Duration;

/// Wait used between polls unless overridden on the command line.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(3);

/// Something that can suspend the current task for a while.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub wait: Duration,
    /// `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_WAIT)
    }
}

impl RetryPolicy {
    /// Unbounded polling with a constant delay (no back-off).
    pub fn fixed(wait: Duration) -> Self {
        Self {
            wait,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether another request may be made after `attempts` have already been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Sleeper;
    use std::future::Future;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records requested sleeps and returns immediately.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) calls: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn calls(&self) -> Vec<Duration> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            self.calls.lock().unwrap().push(duration);
            std::future::ready(())
        }
    }
}
