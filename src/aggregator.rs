//! The fan-in point of a job.
//!
//! Global counts are owned by one or more merge threads ("shards"). Each word is
//! routed to exactly one shard, so shards hold disjoint key sets and never share
//! state. Workers hand their [`PartialCounts`] to a cloneable [`MergeHandle`],
//! which splits them by shard and forwards the pieces over bounded channels.
//!
//! A chunk id is accepted at most once. The ledger of accepted ids is the only
//! lock on the merge path.

use crate::error::{Result, TopWordsError};
use crate::global::GlobalCounts;
use crate::metrics::JobMetrics;
use crate::partial::{ChunkId, PartialCounts};
use crate::topk::{merge_candidates, select_top_k, TopKResult};
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Index of the shard owning `word`
pub fn shard_for(word: &str, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    word.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// Owner threads of the global counts
pub struct Aggregator {
    handle: MergeHandle,
    threads: Vec<JoinHandle<Result<GlobalCounts>>>,
}

impl Aggregator {
    /// Spawn `shards` merge threads, each with a mailbox of `capacity` messages
    pub fn spawn(shards: usize, capacity: usize, metrics: JobMetrics) -> Result<Self> {
        if shards == 0 {
            return Err(TopWordsError::ConfigError(
                "aggregator needs at least one shard".into(),
            ));
        }
        if capacity == 0 {
            return Err(TopWordsError::ConfigError(
                "merge queue capacity must be positive".into(),
            ));
        }

        let mut senders = Vec::with_capacity(shards);
        let mut threads = Vec::with_capacity(shards);
        for idx in 0..shards {
            let (tx, rx) = bounded(capacity);
            senders.push(tx);
            let handle = thread::Builder::new()
                .name(format!("merge-{idx}"))
                .spawn(move || run_shard(idx, rx))
                .map_err(|e| TopWordsError::ThreadError(e.to_string()))?;
            threads.push(handle);
        }

        Ok(Self {
            handle: MergeHandle {
                senders,
                ledger: Arc::new(Mutex::new(HashSet::new())),
                metrics,
            },
            threads,
        })
    }

    /// A handle for submitting partial counts
    pub fn handle(&self) -> MergeHandle {
        self.handle.clone()
    }

    pub fn shards(&self) -> usize {
        self.threads.len()
    }

    /// Wait for every shard to drain its mailbox and collect the final counts.
    ///
    /// Every [`MergeHandle`] obtained from this aggregator must be dropped first,
    /// otherwise the shards never see their mailboxes close. When `expected` is
    /// set, exactly that many distinct chunks must have been accepted.
    pub fn finish(self, expected: Option<u64>) -> Result<FinalCounts> {
        let ledger = Arc::clone(&self.handle.ledger);
        drop(self.handle);

        let mut shards = Vec::with_capacity(self.threads.len());
        let mut first_error = None;
        for handle in self.threads {
            match handle.join() {
                Ok(Ok(counts)) => shards.push(counts),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error
                        .get_or_insert(TopWordsError::ThreadError("merge thread panicked".into()));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let merged = ledger.lock().len() as u64;
        if let Some(expected) = expected {
            if merged != expected {
                return Err(TopWordsError::Incomplete { merged, expected });
            }
        }

        debug!(chunks = merged, shards = shards.len(), "aggregation finished");
        Ok(FinalCounts { shards, chunks: merged })
    }
}

fn run_shard(idx: usize, mailbox: Receiver<PartialCounts>) -> Result<GlobalCounts> {
    let mut counts = GlobalCounts::new();
    let mut failure = None;

    // Keep draining after a failure so senders never block on a dead shard.
    for partial in mailbox.iter() {
        if failure.is_some() {
            continue;
        }
        let chunk = partial.chunk();
        if let Err(e) = counts.merge(partial) {
            error!(shard = idx, chunk, error = %e, "merge failed");
            failure = Some(e);
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(counts),
    }
}

/// Cloneable entry point into the aggregator
#[derive(Debug, Clone)]
pub struct MergeHandle {
    senders: Vec<Sender<PartialCounts>>,
    ledger: Arc<Mutex<HashSet<ChunkId>>>,
    metrics: JobMetrics,
}

impl MergeHandle {
    /// Contribute one chunk's counts.
    ///
    /// Fails with [`TopWordsError::DuplicateChunk`] if this chunk id was already
    /// accepted; the duplicate is not applied.
    pub fn merge(&self, partial: PartialCounts) -> Result<()> {
        let chunk = partial.chunk();
        if !self.ledger.lock().insert(chunk) {
            self.metrics.record_duplicate();
            warn!(chunk, "rejecting duplicate chunk");
            return Err(TopWordsError::DuplicateChunk(chunk));
        }

        if self.senders.len() == 1 {
            self.send(0, partial)?;
        } else {
            let shards = self.senders.len();
            for (idx, piece) in partial
                .split_by(shards, |word| shard_for(word, shards))
                .into_iter()
                .enumerate()
            {
                if !piece.is_empty() {
                    self.send(idx, piece)?;
                }
            }
        }

        self.metrics.record_merged();
        Ok(())
    }

    fn send(&self, shard: usize, piece: PartialCounts) -> Result<()> {
        self.senders[shard]
            .send(piece)
            .map_err(|_| TopWordsError::InputClosed(format!("merge shard {shard} stopped")))
    }
}

/// Fully merged counts, split across shards with disjoint keys
#[derive(Debug)]
pub struct FinalCounts {
    shards: Vec<GlobalCounts>,
    chunks: u64,
}

impl FinalCounts {
    /// Number of chunks that contributed
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.shards.iter().map(GlobalCounts::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(GlobalCounts::is_empty)
    }

    /// Sum of all counts, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.shards
            .iter()
            .fold(0, |acc: u64, shard| acc.saturating_add(shard.total()))
    }

    /// Select the `k` best-ranked words.
    ///
    /// Each shard contributes its own top `k`; since no word spans two shards
    /// the best `k` of that union is the global answer.
    pub fn top_k(&self, k: usize) -> TopKResult {
        if let [only] = self.shards.as_slice() {
            return select_top_k(only, k);
        }
        merge_candidates(self.shards.iter().map(|shard| select_top_k(shard, k)), k)
    }

    /// Collapse the shards into a single map
    pub fn into_global(self) -> Result<GlobalCounts> {
        let mut shards = self.shards.into_iter();
        let mut global = shards.next().unwrap_or_default();
        for shard in shards {
            global.absorb(shard)?;
        }
        Ok(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn partial(chunk: ChunkId, text: &str) -> PartialCounts {
        PartialCounts::from_text(chunk, text, &Tokenizer::new()).unwrap()
    }

    #[test]
    fn test_shard_routing_is_stable() {
        assert_eq!(shard_for("elephant", 1), 0);
        for shards in 2..8 {
            let first = shard_for("elephant", shards);
            assert!(first < shards);
            assert_eq!(first, shard_for("elephant", shards));
        }
    }

    #[test]
    fn test_single_shard_merge() {
        let aggregator = Aggregator::spawn(1, 4, JobMetrics::new()).unwrap();
        let handle = aggregator.handle();
        handle.merge(partial(0, "elephant elephant giraffe")).unwrap();
        handle.merge(partial(1, "elephant; giraffe, giraffe!!")).unwrap();
        drop(handle);

        let counts = aggregator.finish(Some(2)).unwrap();
        assert_eq!(counts.chunks(), 2);
        let global = counts.into_global().unwrap();
        assert_eq!(global.get("elephant"), 3);
        assert_eq!(global.get("giraffe"), 3);
    }

    #[test]
    fn test_sharded_matches_single() {
        let texts = [
            "albatross albatross penguins walruses",
            "penguins penguins flamingo flamingo flamingo",
            "walruses albatross narwhals",
        ];

        let single = Aggregator::spawn(1, 8, JobMetrics::new()).unwrap();
        let sharded = Aggregator::spawn(4, 8, JobMetrics::new()).unwrap();
        {
            let a = single.handle();
            let b = sharded.handle();
            for (i, text) in texts.iter().enumerate() {
                a.merge(partial(i as u64, text)).unwrap();
                b.merge(partial(i as u64, text)).unwrap();
            }
        }

        let single = single.finish(None).unwrap();
        let sharded = sharded.finish(None).unwrap();
        assert_eq!(single.len(), sharded.len());
        assert_eq!(single.total(), sharded.total());
        assert_eq!(single.top_k(3), sharded.top_k(3));
        assert_eq!(single.into_global().unwrap(), sharded.into_global().unwrap());
    }

    #[test]
    fn test_duplicate_chunk_rejected() {
        let metrics = JobMetrics::new();
        let aggregator = Aggregator::spawn(2, 4, metrics.clone()).unwrap();
        let handle = aggregator.handle();
        handle.merge(partial(5, "elephant")).unwrap();
        let err = handle.merge(partial(5, "elephant")).unwrap_err();
        assert_eq!(err, TopWordsError::DuplicateChunk(5));
        drop(handle);

        let global = aggregator.finish(Some(1)).unwrap().into_global().unwrap();
        assert_eq!(global.get("elephant"), 1);
        assert_eq!(metrics.duplicate_chunks(), 1);
        assert_eq!(metrics.chunks_merged(), 1);
    }

    #[test]
    fn test_incomplete_finish() {
        let aggregator = Aggregator::spawn(1, 4, JobMetrics::new()).unwrap();
        aggregator.handle().merge(partial(0, "elephant")).unwrap();
        let err = aggregator.finish(Some(3)).unwrap_err();
        assert_eq!(
            err,
            TopWordsError::Incomplete {
                merged: 1,
                expected: 3
            }
        );
    }

    #[test]
    fn test_overflow_surfaces_on_finish() {
        let aggregator = Aggregator::spawn(1, 4, JobMetrics::new()).unwrap();
        let handle = aggregator.handle();
        let mut big = PartialCounts::new(0);
        big.record_n("giraffes", u64::MAX).unwrap();
        handle.merge(big).unwrap();
        let mut one = PartialCounts::new(1);
        one.record("giraffes").unwrap();
        handle.merge(one).unwrap();
        drop(handle);

        let err = aggregator.finish(None).unwrap_err();
        assert_eq!(
            err,
            TopWordsError::CountOverflow {
                word: "giraffes".into()
            }
        );
    }

    #[test]
    fn test_concurrent_handles() {
        let aggregator = Aggregator::spawn(3, 2, JobMetrics::new()).unwrap();
        let workers: Vec<_> = (0..8u64)
            .map(|w| {
                let handle = aggregator.handle();
                thread::spawn(move || {
                    for i in 0..25u64 {
                        handle
                            .merge(partial(w * 100 + i, "elephant giraffes penguins"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let counts = aggregator.finish(Some(200)).unwrap();
        let top = counts.top_k(10);
        assert_eq!(top.len(), 3);
        assert!(top.iter().all(|entry| entry.count == 200));
    }

    #[test]
    fn test_empty_aggregation() {
        let aggregator = Aggregator::spawn(2, 1, JobMetrics::new()).unwrap();
        let counts = aggregator.finish(None).unwrap();
        assert!(counts.is_empty());
        assert!(counts.top_k(100).is_empty());
    }

    #[test]
    fn test_zero_shards_rejected() {
        assert!(matches!(
            Aggregator::spawn(0, 1, JobMetrics::new()),
            Err(TopWordsError::ConfigError(_))
        ));
    }
}
