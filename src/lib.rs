//! Finds the most frequent long words of a large text corpus.
//!
//! Work is split the map/combine/reduce way: every chunk of input is tokenized
//! and counted on its own by a pool of map workers, the per-chunk counts are
//! merged by owner threads that each hold a disjoint slice of the vocabulary,
//! and the highest-count words are picked with a bounded heap once every chunk
//! has been merged.
//!
//! # Features
//!
//! - Punctuation-stripping tokenizer keeping words longer than six characters
//! - Per-chunk pre-aggregation before the fan-in boundary
//! - Exactly-once chunk accounting and checked (overflow-safe) counting
//! - Hash-sharded merge threads connected by bounded crossbeam channels
//! - Top-k selection in O(n log k), ties broken by word ascending
//!
//! # Example
//!
//! ```ignore
//! use top_words::{Chunk, JobBuilder};
//!
//! let running = JobBuilder::new().workers(4).shards(2).build()?.start()?;
//! running.submit(Chunk::new(0, "elephant elephant giraffe"))?;
//! running.submit(Chunk::new(1, "elephant; giraffe, giraffe!!"))?;
//!
//! let report = running.finish()?;
//! print!("{}", report.top.to_lines());
//! ```

pub mod aggregator;
pub mod error;
pub mod global;
pub mod job;
pub mod metrics;
pub mod partial;
pub mod tokenizer;
pub mod topk;
pub mod worker;

pub use aggregator::{Aggregator, FinalCounts, MergeHandle};
pub use error::{Result, TopWordsError};
pub use global::GlobalCounts;
pub use job::{count_top_words, ChunkSender, Job, JobBuilder, JobConfig, JobReport, RunningJob};
pub use metrics::{JobMetrics, MetricsSnapshot};
pub use partial::{Chunk, ChunkId, Count, PartialCounts};
pub use tokenizer::Tokenizer;
pub use topk::{select_top_k, TopK, TopKResult, WordCount};
pub use worker::{MapWorker, Mapper, WordCountMapper};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
