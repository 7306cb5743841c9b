use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A simple percentile tracker that maintains a sliding window of measurements
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    measurements: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a new percentile tracker with a specified window size
    pub fn new(window_size: usize) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record a measurement (in nanoseconds)
    pub fn record(&self, nanos: u64) {
        let mut measurements = self.measurements.lock();
        if measurements.len() >= self.window_size {
            measurements.pop_front();
        }
        measurements.push_back(nanos);
    }

    /// Median in microseconds
    pub fn p50_us(&self) -> f64 {
        self.percentile(0.50)
    }

    /// 99th percentile in microseconds
    pub fn p99_us(&self) -> f64 {
        self.percentile(0.99)
    }

    fn percentile(&self, p: f64) -> f64 {
        let measurements = self.measurements.lock();
        if measurements.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<_> = measurements.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize).saturating_sub(1);
        sorted[idx] as f64 / 1000.0
    }

    /// Get the count of recorded measurements
    pub fn count(&self) -> usize {
        self.measurements.lock().len()
    }
}

/// Counters shared by every worker and merge owner of a job
#[derive(Debug, Clone)]
pub struct JobMetrics {
    chunks_mapped: Arc<AtomicU64>,
    chunks_failed: Arc<AtomicU64>,
    chunks_merged: Arc<AtomicU64>,
    duplicate_chunks: Arc<AtomicU64>,
    words_emitted: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    invalid_sequences: Arc<AtomicU64>,
    /// Time spent tokenizing and counting one chunk
    map_latency: PercentileTracker,
    start_time: Instant,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self {
            chunks_mapped: Arc::new(AtomicU64::new(0)),
            chunks_failed: Arc::new(AtomicU64::new(0)),
            chunks_merged: Arc::new(AtomicU64::new(0)),
            duplicate_chunks: Arc::new(AtomicU64::new(0)),
            words_emitted: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            invalid_sequences: Arc::new(AtomicU64::new(0)),
            map_latency: PercentileTracker::new(1000),
            start_time: Instant::now(),
        }
    }

    /// Record a chunk that was tokenized and counted
    pub fn record_mapped(&self, bytes: usize, words: u64, invalid_sequences: u64, nanos: u64) {
        self.chunks_mapped.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
        self.words_emitted.fetch_add(words, Ordering::Relaxed);
        self.invalid_sequences
            .fetch_add(invalid_sequences, Ordering::Relaxed);
        self.map_latency.record(nanos);
    }

    pub fn record_failed(&self) {
        self.chunks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merged(&self) {
        self.chunks_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicate_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunks_mapped(&self) -> u64 {
        self.chunks_mapped.load(Ordering::Relaxed)
    }

    pub fn chunks_failed(&self) -> u64 {
        self.chunks_failed.load(Ordering::Relaxed)
    }

    pub fn chunks_merged(&self) -> u64 {
        self.chunks_merged.load(Ordering::Relaxed)
    }

    pub fn duplicate_chunks(&self) -> u64 {
        self.duplicate_chunks.load(Ordering::Relaxed)
    }

    pub fn words_emitted(&self) -> u64 {
        self.words_emitted.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn invalid_sequences(&self) -> u64 {
        self.invalid_sequences.load(Ordering::Relaxed)
    }

    /// Input throughput in bytes per second
    pub fn throughput_bps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.bytes_read() as f64 / elapsed
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_mapped: self.chunks_mapped(),
            chunks_failed: self.chunks_failed(),
            chunks_merged: self.chunks_merged(),
            duplicate_chunks: self.duplicate_chunks(),
            words_emitted: self.words_emitted(),
            bytes_read: self.bytes_read(),
            invalid_sequences: self.invalid_sequences(),
            throughput_bps: self.throughput_bps(),
            map_latency_p50_us: self.map_latency.p50_us(),
            map_latency_p99_us: self.map_latency.p99_us(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub chunks_mapped: u64,
    pub chunks_failed: u64,
    pub chunks_merged: u64,
    pub duplicate_chunks: u64,
    pub words_emitted: u64,
    pub bytes_read: u64,
    pub invalid_sequences: u64,
    pub throughput_bps: f64,
    pub map_latency_p50_us: f64,
    pub map_latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Chunks: {} mapped, {} failed, {} merged, {} duplicate; Words: {}, Bytes: {}, \
             Invalid UTF-8: {}, Throughput: {:.2} B/s, Map P50: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.chunks_mapped,
            self.chunks_failed,
            self.chunks_merged,
            self.duplicate_chunks,
            self.words_emitted,
            self.bytes_read,
            self.invalid_sequences,
            self.throughput_bps,
            self.map_latency_p50_us,
            self.map_latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
