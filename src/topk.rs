//! Selection of the highest-count words.
//!
//! Entries are ranked by count descending, then by word ascending (plain byte
//! order of the UTF-8 text). The ranking is total, so the result for a given
//! set of counts never depends on iteration order.
//!
//! Selection keeps a bounded heap of the `k` best entries seen so far with the
//! worst of them on top, costing O(n log k) instead of sorting all n words.

use crate::global::GlobalCounts;
use crate::partial::Count;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// Default number of words reported
pub const DEFAULT_TOP_K: usize = 100;

/// A word and its count
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: Count,
}

impl WordCount {
    pub fn new(word: impl Into<String>, count: Count) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }

    /// Ranking order: `Less` means `self` ranks ahead of `other`
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .count
            .cmp(&self.count)
            .then_with(|| self.word.cmp(&other.word))
    }
}

impl fmt::Display for WordCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.word, self.count)
    }
}

/// Heap entry ordered so that the worst-ranked entry is the heap maximum
#[derive(Debug, PartialEq, Eq)]
struct Ranked(WordCount);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded selector of the `k` best-ranked entries
#[derive(Debug)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    /// Create a selector keeping at most `k` entries
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Offer a candidate; borrowed words are only cloned when kept
    pub fn offer(&mut self, word: &str, count: Count) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() == self.k {
            let Some(worst) = self.heap.peek() else {
                return;
            };
            let candidate_ranks_ahead = match worst.0.count.cmp(&count) {
                Ordering::Less => true,
                Ordering::Equal => word < worst.0.word.as_str(),
                Ordering::Greater => false,
            };
            if !candidate_ranks_ahead {
                return;
            }
            self.heap.pop();
        }
        self.heap.push(Ranked(WordCount::new(word, count)));
    }

    /// Offer an owned entry
    pub fn push(&mut self, entry: WordCount) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() == self.k {
            match self.heap.peek() {
                Some(worst) if entry.rank_cmp(&worst.0) == Ordering::Less => {
                    self.heap.pop();
                }
                _ => return,
            }
        }
        self.heap.push(Ranked(entry));
    }

    /// Number of entries currently kept
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Finish selection, best-ranked first
    pub fn into_result(self) -> TopKResult {
        let entries = self
            .heap
            .into_sorted_vec()
            .into_iter()
            .map(|Ranked(entry)| entry)
            .collect();
        TopKResult { entries }
    }
}

impl Extend<WordCount> for TopK {
    fn extend<I: IntoIterator<Item = WordCount>>(&mut self, iter: I) {
        for entry in iter {
            self.push(entry);
        }
    }
}

/// The final ranked words, best first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopKResult {
    entries: Vec<WordCount>,
}

impl TopKResult {
    pub fn entries(&self) -> &[WordCount] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest count in the result
    pub fn min_count(&self) -> Option<Count> {
        self.entries.last().map(|entry| entry.count)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WordCount> {
        self.entries.iter()
    }

    /// Render as `word\tcount` lines
    pub fn to_lines(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    pub fn into_vec(self) -> Vec<WordCount> {
        self.entries
    }
}

impl IntoIterator for TopKResult {
    type Item = WordCount;
    type IntoIter = std::vec::IntoIter<WordCount>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Select the `k` best-ranked words of a finalized count map
pub fn select_top_k(counts: &GlobalCounts, k: usize) -> TopKResult {
    let mut top = TopK::new(k);
    for (word, count) in counts.iter() {
        top.offer(word, count);
    }
    top.into_result()
}

/// Select the `k` best-ranked words from candidate lists over disjoint key sets
pub fn merge_candidates<I>(candidates: I, k: usize) -> TopKResult
where
    I: IntoIterator<Item = TopKResult>,
{
    let mut top = TopK::new(k);
    for list in candidates {
        top.extend(list);
    }
    top.into_result()
}
