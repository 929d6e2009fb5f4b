//! Production Environment implementation.
//!
//! `SystemEnv` uses tokio's clock, so it follows `tokio::time::pause` in
//! tests and the real monotonic clock otherwise.

use std::time::Duration;

use nutler_core::Environment;

/// Production environment backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(1000)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_millis(1000), "Sleep should wait at least 1000ms");
    }

    #[tokio::test]
    async fn time_never_goes_backwards() {
        let env = SystemEnv::new();

        let t1 = env.now();
        env.sleep(Duration::from_millis(5)).await;
        let t2 = env.now();

        assert!(t2 >= t1, "Time should not go backwards");
    }
}
