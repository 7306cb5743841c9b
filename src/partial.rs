//! Per-chunk pre-aggregation.
//!
//! Each chunk is reduced to a word -> count map before it crosses the fan-in
//! boundary. The result is the same as sending every occurrence individually.

use crate::error::{Result, TopWordsError};
use crate::tokenizer::Tokenizer;
use std::collections::hash_map::{self, HashMap};

/// Caller-assigned identity of a chunk, unique within one job
pub type ChunkId = u64;

/// Number of occurrences of a word
pub type Count = u64;

/// A unit of raw input text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    id: ChunkId,
    data: Vec<u8>,
}

impl Chunk {
    /// Create a chunk from raw bytes
    pub fn new(id: ChunkId, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Word counts of a single chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCounts {
    chunk: ChunkId,
    counts: HashMap<String, Count>,
    invalid_sequences: u64,
}

impl PartialCounts {
    /// Create an empty map for a chunk
    pub fn new(chunk: ChunkId) -> Self {
        Self {
            chunk,
            counts: HashMap::new(),
            invalid_sequences: 0,
        }
    }

    /// Count the words of a text chunk
    pub fn from_text(chunk: ChunkId, text: &str, tokenizer: &Tokenizer) -> Result<Self> {
        let mut partial = Self::new(chunk);
        for word in tokenizer.tokenize(text) {
            partial.record(word)?;
        }
        Ok(partial)
    }

    /// Count the words of a raw chunk, skipping invalid UTF-8
    pub fn from_chunk(chunk: &Chunk, tokenizer: &Tokenizer) -> Result<Self> {
        let mut partial = Self::new(chunk.id());
        let mut words = tokenizer.tokenize_bytes(chunk.data());
        for word in words.by_ref() {
            partial.record(word)?;
        }
        partial.invalid_sequences = words.invalid_sequences();
        Ok(partial)
    }

    /// Add one occurrence of `word`
    pub fn record(&mut self, word: &str) -> Result<()> {
        self.record_n(word, 1)
    }

    /// Add `n` occurrences of `word`
    pub fn record_n(&mut self, word: &str, n: Count) -> Result<()> {
        match self.counts.get_mut(word) {
            Some(count) => {
                *count = count
                    .checked_add(n)
                    .ok_or_else(|| TopWordsError::CountOverflow {
                        word: word.to_owned(),
                    })?;
            }
            None => {
                self.counts.insert(word.to_owned(), n);
            }
        }
        Ok(())
    }

    /// The chunk these counts were built from
    pub fn chunk(&self) -> ChunkId {
        self.chunk
    }

    /// Count for `word`, zero if absent
    pub fn get(&self, word: &str) -> Count {
        self.counts.get(word).copied().unwrap_or(0)
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, saturating at `u64::MAX`
    pub fn total(&self) -> Count {
        self.counts
            .values()
            .fold(0, |acc: Count, &count| acc.saturating_add(count))
    }

    /// Invalid UTF-8 sequences skipped while tokenizing
    pub fn invalid_sequences(&self) -> u64 {
        self.invalid_sequences
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Count)> + '_ {
        self.counts.iter().map(|(word, &count)| (word.as_str(), count))
    }

    /// Split into `parts` maps, routing each word with `route`.
    ///
    /// Every resulting map keeps this chunk's id.
    pub(crate) fn split_by<F>(self, parts: usize, route: F) -> Vec<PartialCounts>
    where
        F: Fn(&str) -> usize,
    {
        let mut split: Vec<_> = (0..parts).map(|_| Self::new(self.chunk)).collect();
        for (word, count) in self.counts {
            let idx = route(&word);
            split[idx].counts.insert(word, count);
        }
        split
    }
}

impl IntoIterator for PartialCounts {
    type Item = (String, Count);
    type IntoIter = hash_map::IntoIter<String, Count>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}
