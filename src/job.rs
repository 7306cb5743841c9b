use crate::aggregator::Aggregator;
use crate::error::{Result, TopWordsError};
use crate::metrics::{JobMetrics, MetricsSnapshot};
use crate::partial::{Chunk, ChunkId};
use crate::tokenizer::{Tokenizer, MIN_WORD_LEN};
use crate::topk::{TopKResult, DEFAULT_TOP_K};
use crate::worker::{MapWorker, Mapper, WordCountMapper};
use crossbeam::channel::{bounded, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Settings of a counting job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Number of map threads
    pub workers: usize,
    /// Number of merge threads owning disjoint parts of the global counts
    pub shards: usize,
    /// Number of words reported
    pub top_k: usize,
    /// Capacity of the chunk queue and of each shard mailbox
    pub queue_capacity: usize,
    /// Words must be strictly longer than this many characters
    pub min_word_len: usize,
    /// When set, finishing fails unless exactly this many chunks were merged
    pub expected_chunks: Option<u64>,
}

impl JobConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TopWordsError::ConfigError(e.to_string()))
    }

    /// Check that every size is usable
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(TopWordsError::ConfigError("workers must be positive".into()));
        }
        if self.shards == 0 {
            return Err(TopWordsError::ConfigError("shards must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(TopWordsError::ConfigError(
                "queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, |n| n.get()),
            shards: 1,
            top_k: DEFAULT_TOP_K,
            queue_capacity: 64,
            min_word_len: MIN_WORD_LEN,
            expected_chunks: None,
        }
    }
}

/// Builder for constructing jobs
pub struct JobBuilder {
    config: JobConfig,
    mapper: Option<Arc<dyn Mapper>>,
}

impl JobBuilder {
    /// Create a new job builder with default settings
    pub fn new() -> Self {
        Self::from_config(JobConfig::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: JobConfig) -> Self {
        Self {
            config,
            mapper: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn min_word_len(mut self, len: usize) -> Self {
        self.config.min_word_len = len;
        self
    }

    pub fn expected_chunks(mut self, chunks: u64) -> Self {
        self.config.expected_chunks = Some(chunks);
        self
    }

    /// Replace the default word counting mapper
    pub fn mapper(mut self, mapper: impl Mapper) -> Self {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Build the job
    pub fn build(self) -> Result<Job> {
        self.config.validate()?;
        let mapper = self.mapper.unwrap_or_else(|| {
            Arc::new(WordCountMapper::new(Tokenizer::with_min_len(
                self.config.min_word_len,
            )))
        });
        Ok(Job {
            config: self.config,
            mapper,
            metrics: JobMetrics::new(),
        })
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured job that has not started yet
pub struct Job {
    config: JobConfig,
    mapper: Arc<dyn Mapper>,
    metrics: JobMetrics,
}

impl Job {
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    /// Spawn the merge threads and the map workers
    pub fn start(self) -> Result<RunningJob> {
        let aggregator = Aggregator::spawn(
            self.config.shards,
            self.config.queue_capacity,
            self.metrics.clone(),
        )?;
        let (input, chunks) = bounded(self.config.queue_capacity);
        let failed = Arc::new(Mutex::new(Vec::new()));

        let mut workers = Vec::with_capacity(self.config.workers);
        for idx in 0..self.config.workers {
            let worker = MapWorker::new(
                idx,
                chunks.clone(),
                aggregator.handle(),
                self.metrics.clone(),
                Arc::clone(&failed),
            );
            let mapper = Arc::clone(&self.mapper);
            let handle = thread::Builder::new()
                .name(format!("map-{idx}"))
                .spawn(move || worker.run(mapper))
                .map_err(|e| TopWordsError::ThreadError(e.to_string()))?;
            workers.push(handle);
        }

        info!(
            workers = self.config.workers,
            shards = self.config.shards,
            top_k = self.config.top_k,
            "job started"
        );

        Ok(RunningJob {
            input: ChunkSender { tx: input },
            workers,
            aggregator,
            failed,
            config: self.config,
            metrics: self.metrics,
        })
    }
}

/// Cloneable producer side of a running job
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: Sender<Chunk>,
}

impl ChunkSender {
    /// Queue a chunk, blocking while the queue is full
    pub fn submit(&self, chunk: Chunk) -> Result<()> {
        self.tx
            .send(chunk)
            .map_err(|e| TopWordsError::InputClosed(format!("chunk {} not accepted", e.0.id())))
    }
}

/// Result of a finished job
#[derive(Debug, Clone)]
pub struct JobReport {
    /// The ranked words
    pub top: TopKResult,
    /// Chunks that contributed to the counts
    pub chunks_merged: u64,
    /// Chunks whose mapper failed; they contributed nothing
    pub failed_chunks: Vec<ChunkId>,
    /// Distinct words counted
    pub distinct_words: usize,
    /// Total qualifying words counted
    pub total_words: u64,
    pub metrics: MetricsSnapshot,
}

/// A started job accepting chunks
pub struct RunningJob {
    input: ChunkSender,
    workers: Vec<JoinHandle<Result<()>>>,
    aggregator: Aggregator,
    failed: Arc<Mutex<Vec<ChunkId>>>,
    config: JobConfig,
    metrics: JobMetrics,
}

impl RunningJob {
    /// Get a sender for feeding chunks
    pub fn input(&self) -> ChunkSender {
        self.input.clone()
    }

    /// Queue a chunk
    pub fn submit(&self, chunk: Chunk) -> Result<()> {
        self.input.submit(chunk)
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    /// Close the input, wait for all chunks to be merged and select the top words.
    ///
    /// Senders obtained from [`RunningJob::input`] must be dropped before calling
    /// this, since workers run until the chunk queue closes.
    pub fn finish(self) -> Result<JobReport> {
        drop(self.input);

        let mut first_error = None;
        for handle in self.workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error
                        .get_or_insert(TopWordsError::ThreadError("map worker panicked".into()));
                }
            }
        }

        // Workers are gone, so every merge handle but the aggregator's own is dropped.
        let counts = self.aggregator.finish(self.config.expected_chunks);
        if let Some(e) = first_error {
            return Err(e);
        }
        let counts = counts?;

        let top = counts.top_k(self.config.top_k);
        let mut failed_chunks = std::mem::take(&mut *self.failed.lock());
        failed_chunks.sort_unstable();

        let report = JobReport {
            top,
            chunks_merged: counts.chunks(),
            failed_chunks,
            distinct_words: counts.len(),
            total_words: counts.total(),
            metrics: self.metrics.snapshot(),
        };
        info!("{}", report.metrics.format());
        debug!(
            distinct = report.distinct_words,
            total = report.total_words,
            reported = report.top.len(),
            "job finished"
        );
        Ok(report)
    }
}

/// Count the top words of a set of text chunks in one call.
///
/// Chunks are numbered in iteration order.
pub fn count_top_words<I, T>(chunks: I, config: JobConfig) -> Result<JobReport>
where
    I: IntoIterator<Item = T>,
    T: Into<Vec<u8>>,
{
    let running = JobBuilder::from_config(config).build()?.start()?;
    let mut submitted = Ok(());
    for (id, data) in chunks.into_iter().enumerate() {
        submitted = running.submit(Chunk::new(id as ChunkId, data));
        if submitted.is_err() {
            break;
        }
    }
    let report = running.finish();
    submitted?;
    report
}
