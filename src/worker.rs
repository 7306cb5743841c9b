use crate::aggregator::MergeHandle;
use crate::error::{Result, TopWordsError};
use crate::metrics::JobMetrics;
use crate::partial::{Chunk, ChunkId, PartialCounts};
use crate::tokenizer::Tokenizer;
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Turns one chunk into its partial counts
pub trait Mapper: Send + Sync + 'static {
    /// Tokenize and count a chunk.
    /// An error discards the chunk; nothing of it reaches the aggregator.
    fn map(&self, chunk: &Chunk) -> Result<PartialCounts>;

    /// Get a human-readable name for this mapper
    fn name(&self) -> &str {
        "mapper"
    }
}

/// Counts the words a [`Tokenizer`] yields
#[derive(Debug, Clone, Default)]
pub struct WordCountMapper {
    tokenizer: Tokenizer,
}

impl WordCountMapper {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

impl Mapper for WordCountMapper {
    fn map(&self, chunk: &Chunk) -> Result<PartialCounts> {
        PartialCounts::from_chunk(chunk, &self.tokenizer)
    }

    fn name(&self) -> &str {
        "word_count"
    }
}

/// Pulls chunks from the input queue, maps them and hands the results to the aggregator
pub struct MapWorker {
    id: usize,
    input: Receiver<Chunk>,
    merge: MergeHandle,
    metrics: JobMetrics,
    failed: Arc<Mutex<Vec<ChunkId>>>,
}

impl MapWorker {
    pub fn new(
        id: usize,
        input: Receiver<Chunk>,
        merge: MergeHandle,
        metrics: JobMetrics,
        failed: Arc<Mutex<Vec<ChunkId>>>,
    ) -> Self {
        Self {
            id,
            input,
            merge,
            metrics,
            failed,
        }
    }

    /// Run until the input queue is closed and drained.
    ///
    /// A failing chunk is recorded and skipped. A merge error other than a
    /// duplicate chunk stops the worker.
    pub fn run(self, mapper: Arc<dyn Mapper>) -> Result<()> {
        debug!(worker = self.id, mapper = mapper.name(), "worker started");

        for chunk in self.input.iter() {
            let start = Instant::now();
            let partial = match mapper.map(&chunk) {
                Ok(partial) => partial,
                Err(e) => {
                    warn!(worker = self.id, chunk = chunk.id(), error = %e, "chunk failed");
                    self.metrics.record_failed();
                    self.failed.lock().push(chunk.id());
                    continue;
                }
            };

            self.metrics.record_mapped(
                chunk.len(),
                partial.total(),
                partial.invalid_sequences(),
                start.elapsed().as_nanos() as u64,
            );
            trace!(
                worker = self.id,
                chunk = chunk.id(),
                distinct = partial.len(),
                "chunk mapped"
            );

            match self.merge.merge(partial) {
                Ok(()) | Err(TopWordsError::DuplicateChunk(_)) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(worker = self.id, "worker finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crossbeam::channel::bounded;

    struct FailingMapper {
        bad: ChunkId,
    }

    impl Mapper for FailingMapper {
        fn map(&self, chunk: &Chunk) -> Result<PartialCounts> {
            if chunk.id() == self.bad {
                return Err(TopWordsError::MapError {
                    chunk: chunk.id(),
                    reason: "unreadable".into(),
                });
            }
            WordCountMapper::default().map(chunk)
        }
    }

    #[test]
    fn test_word_count_mapper() {
        let mapper = WordCountMapper::default();
        let partial = mapper
            .map(&Chunk::new(4, "elephant elephant giraffe"))
            .unwrap();
        assert_eq!(partial.chunk(), 4);
        assert_eq!(partial.get("elephant"), 2);
        assert_eq!(mapper.name(), "word_count");
    }

    #[test]
    fn test_worker_skips_failed_chunk() {
        let metrics = JobMetrics::new();
        let aggregator = Aggregator::spawn(1, 4, metrics.clone()).unwrap();
        let failed = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = bounded(4);

        let worker = MapWorker::new(0, rx, aggregator.handle(), metrics.clone(), failed.clone());
        tx.send(Chunk::new(0, "elephant giraffes")).unwrap();
        tx.send(Chunk::new(1, "elephant elephant")).unwrap();
        tx.send(Chunk::new(2, "giraffes")).unwrap();
        drop(tx);

        worker.run(Arc::new(FailingMapper { bad: 1 })).unwrap();

        let global = aggregator.finish(Some(2)).unwrap().into_global().unwrap();
        assert_eq!(global.get("elephant"), 1);
        assert_eq!(global.get("giraffes"), 2);
        assert_eq!(*failed.lock(), vec![1]);
        assert_eq!(metrics.chunks_failed(), 1);
        assert_eq!(metrics.chunks_mapped(), 2);
    }

    #[test]
    fn test_worker_ignores_duplicate_chunk() {
        let metrics = JobMetrics::new();
        let aggregator = Aggregator::spawn(1, 4, metrics.clone()).unwrap();
        let (tx, rx) = bounded(4);

        let worker = MapWorker::new(
            0,
            rx,
            aggregator.handle(),
            metrics.clone(),
            Arc::new(Mutex::new(Vec::new())),
        );
        tx.send(Chunk::new(7, "elephant")).unwrap();
        tx.send(Chunk::new(7, "elephant")).unwrap();
        drop(tx);

        worker.run(Arc::new(WordCountMapper::default())).unwrap();

        let global = aggregator.finish(None).unwrap().into_global().unwrap();
        assert_eq!(global.get("elephant"), 1);
        assert_eq!(metrics.duplicate_chunks(), 1);
    }
}
