//! Throughput statistics for the peer link

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Snapshot of link traffic since the counters were last reset
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// Bytes received from the remote peer
    pub received_bytes: u64,
    /// Bytes sent to the remote peer
    pub sent_bytes: u64,
    /// Messages received
    pub received_messages: u64,
    /// Messages sent
    pub sent_messages: u64,
    /// Messages dropped as malformed or unknown
    pub dropped_messages: u64,
    /// Start of the measurement window
    pub since: Instant,
}

impl LinkStats {
    fn rate_kbps(bytes: u64, since: Instant) -> f64 {
        let elapsed_secs = since.elapsed().as_secs_f64();
        if elapsed_secs > 0.0 {
            (bytes as f64) / 1024.0 / elapsed_secs
        } else {
            0.0
        }
    }

    pub fn received_kbps(&self) -> f64 {
        Self::rate_kbps(self.received_bytes, self.since)
    }

    pub fn sent_kbps(&self) -> f64 {
        Self::rate_kbps(self.sent_bytes, self.since)
    }
}

impl std::fmt::Display for LinkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "in {:.2} KB/s ({} msgs), out {:.2} KB/s ({} msgs)",
            self.received_kbps(),
            self.received_messages,
            self.sent_kbps(),
            self.sent_messages
        )?;
        if self.dropped_messages > 0 {
            write!(f, ", {} dropped", self.dropped_messages)?;
        }
        Ok(())
    }
}

/// Lock-free counters shared between the link and its observers
#[derive(Debug, Clone)]
pub struct StatsTracker {
    received_bytes: Arc<AtomicU64>,
    sent_bytes: Arc<AtomicU64>,
    received_messages: Arc<AtomicU64>,
    sent_messages: Arc<AtomicU64>,
    dropped_messages: Arc<AtomicU64>,
    since: Arc<std::sync::Mutex<Instant>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            received_bytes: Arc::new(AtomicU64::new(0)),
            sent_bytes: Arc::new(AtomicU64::new(0)),
            received_messages: Arc::new(AtomicU64::new(0)),
            sent_messages: Arc::new(AtomicU64::new(0)),
            dropped_messages: Arc::new(AtomicU64::new(0)),
            since: Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    pub fn record_received(&self, bytes: usize) {
        self.received_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.received_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.sent_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.sent_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> LinkStats {
        let since = self
            .since
            .lock()
            .map(|since| *since)
            .unwrap_or_else(|poisoned| *poisoned.into_inner());
        LinkStats {
            received_bytes: self.received_bytes.load(Ordering::Relaxed),
            sent_bytes: self.sent_bytes.load(Ordering::Relaxed),
            received_messages: self.received_messages.load(Ordering::Relaxed),
            sent_messages: self.sent_messages.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            since,
        }
    }

    /// Zero all counters and restart the measurement window
    pub fn reset(&self) {
        self.received_bytes.store(0, Ordering::Relaxed);
        self.sent_bytes.store(0, Ordering::Relaxed);
        self.received_messages.store(0, Ordering::Relaxed);
        self.sent_messages.store(0, Ordering::Relaxed);
        self.dropped_messages.store(0, Ordering::Relaxed);
        match self.since.lock() {
            Ok(mut since) => *since = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_and_resets() {
        let tracker = StatsTracker::new();
        tracker.record_received(1024);
        tracker.record_sent(512);
        tracker.record_sent(512);
        tracker.record_dropped();

        let stats = tracker.get_stats();
        assert_eq!(stats.received_bytes, 1024);
        assert_eq!(stats.sent_bytes, 1024);
        assert_eq!(stats.received_messages, 1);
        assert_eq!(stats.sent_messages, 2);
        assert_eq!(stats.dropped_messages, 1);

        tracker.reset();
        let stats = tracker.get_stats();
        assert_eq!(stats.received_bytes, 0);
        assert_eq!(stats.sent_messages, 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = StatsTracker::new();
        let clone = tracker.clone();
        clone.record_received(10);
        assert_eq!(tracker.get_stats().received_bytes, 10);
    }

    #[test]
    fn test_display() {
        let tracker = StatsTracker::new();
        tracker.record_received(2048);
        std::thread::sleep(std::time::Duration::from_millis(10));
        let display = tracker.get_stats().to_string();
        assert!(display.contains("KB/s"));
        assert!(!display.contains("dropped"));

        tracker.record_dropped();
        assert!(tracker.get_stats().to_string().contains("1 dropped"));
    }
}
