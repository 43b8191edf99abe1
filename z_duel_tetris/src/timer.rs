use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::tetris::FallSchedule;

/// Repeating fall tick, kept in line with [`Tetris::fall_schedule`]
///
/// The timer is a cancellable handle: every schedule change drops the old
/// interval and starts a fresh one, so the first tick comes one full period
/// after the change.
///
/// [`Tetris::fall_schedule`]: crate::tetris::Tetris::fall_schedule
#[derive(Debug, Default)]
pub struct FallTimer {
    interval: Option<Interval>,
    schedule: Option<FallSchedule>,
}

impl FallTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow `schedule`; returns true if the timer was replaced or stopped
    pub fn sync(&mut self, schedule: Option<FallSchedule>) -> bool {
        if schedule == self.schedule {
            return false;
        }
        self.schedule = schedule;
        self.interval = schedule.map(|schedule| {
            let mut interval = interval_at(Instant::now() + schedule.interval, schedule.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        true
    }

    pub fn stop(&mut self) {
        self.sync(None);
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn schedule(&self) -> Option<FallSchedule> {
        self.schedule
    }

    /// Wait for the next tick; never completes while stopped
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` loop.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn schedule(ms: u64, generation: u64) -> Option<FallSchedule> {
        Some(FallSchedule {
            interval: Duration::from_millis(ms),
            generation,
        })
    }

    #[tokio::test]
    async fn test_stopped_timer_never_fires() {
        let mut timer = FallTimer::new();
        assert!(!timer.is_running());
        let fired = tokio::time::timeout(Duration::from_millis(50), timer.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_running_timer_fires_after_one_period() {
        let mut timer = FallTimer::new();
        assert!(timer.sync(schedule(20, 1)));
        assert!(timer.is_running());

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(2), timer.tick())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_sync_replaces_only_on_change() {
        let mut timer = FallTimer::new();
        assert!(timer.sync(schedule(1000, 1)));
        assert!(!timer.sync(schedule(1000, 1)));
        // Same interval, new generation: restart
        assert!(timer.sync(schedule(1000, 2)));
        assert!(timer.sync(schedule(800, 2)));

        timer.stop();
        assert!(!timer.is_running());
        assert!(timer.schedule().is_none());
        // Resuming the same schedule starts it again
        assert!(timer.sync(schedule(800, 2)));
        assert!(timer.is_running());
    }
}
