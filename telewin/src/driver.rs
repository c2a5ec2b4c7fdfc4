//! The periodic tick driver.
//!
//! [`TickDriver`] advances the registry clock once per configured period on a
//! tokio interval. Each period is one [`Registry::tick`]: idle periods are
//! silent, busy ones trim every series and wake consumers. When the driver
//! stops it closes the registry, which ends every consumer's update loop.
//!
//! Missed periods (a stalled runtime) are skipped rather than replayed in a
//! burst, so a late driver never signals several ticks back to back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::{Registry, TickOutcome};

/// Counters accumulated over a driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Periods elapsed.
    pub ticks: u64,
    /// Periods that woke consumers.
    pub signalled: u64,
    /// Samples evicted across all series.
    pub evicted: u64,
}

impl DriverStats {
    fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        if outcome.signalled {
            self.signalled += 1;
        }
        self.evicted += outcome.evicted as u64;
    }
}

/// Advances a [`Registry`] on a fixed period.
#[derive(Debug)]
pub struct TickDriver {
    registry: Arc<Registry>,
    period: Duration,
    max_ticks: Option<u64>,
}

impl TickDriver {
    /// Creates a driver using the registry's configured tick period.
    pub fn new(registry: Arc<Registry>) -> Self {
        let period = registry.tick_period();
        Self {
            registry,
            period,
            max_ticks: None,
        }
    }

    /// Stops the driver on its own after `ticks` periods.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Runs a single period immediately, without waiting.
    pub fn tick_once(&self) -> TickOutcome {
        self.registry.tick()
    }

    /// Ticks until `shutdown` resolves or the tick limit is reached, then
    /// closes the registry.
    pub async fn run_until<F>(self, shutdown: F) -> DriverStats
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; periods start after it.
        ticker.tick().await;

        tracing::info!(period = ?self.period, span = self.registry.retention_span(), "tick driver started");
        let mut stats = DriverStats::default();
        tokio::pin!(shutdown);

        loop {
            if self.max_ticks.is_some_and(|max| stats.ticks >= max) {
                break;
            }
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => stats.record(self.registry.tick()),
            }
        }

        self.registry.close();
        tracing::info!(
            ticks = stats.ticks,
            signalled = stats.signalled,
            evicted = stats.evicted,
            "tick driver stopped"
        );
        stats
    }

    /// Spawns [`TickDriver::run_until`] on the current tokio runtime.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<DriverStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run_until(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SeriesConfig, WindowConfig};

    fn registry() -> Arc<Registry> {
        let config = WindowConfig {
            retention_span: 3,
            tick_period_ms: 100,
            ..WindowConfig::default()
        }
        .with_series(SeriesConfig::new("a", "v"));
        Arc::new(Registry::new(config).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_fixed_number_of_ticks() {
        let reg = registry();
        reg.push("a", 1.0).unwrap();

        let start = tokio::time::Instant::now();
        let stats = TickDriver::new(Arc::clone(&reg))
            .with_max_ticks(5)
            .run_until(std::future::pending())
            .await;

        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.signalled, 1);
        assert_eq!(reg.last_x(), 5);
        assert!(reg.is_closed());
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_driver() {
        let reg = registry();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = TickDriver::new(Arc::clone(&reg)).spawn(async {
            let _ = rx.await;
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        tx.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.signalled, 0);
        assert!(reg.is_closed());
    }

    #[test]
    fn test_tick_once() {
        let reg = registry();
        let driver = TickDriver::new(Arc::clone(&reg));
        reg.push("a", 2.0).unwrap();
        let outcome = driver.tick_once();
        assert_eq!(outcome.tick, 1);
        assert!(outcome.signalled);
    }
}
