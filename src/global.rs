use crate::error::{Result, TopWordsError};
use crate::partial::{Count, PartialCounts};
use std::collections::HashMap;

/// Corpus-wide word counts, the sum of every merged [`PartialCounts`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalCounts {
    counts: HashMap<String, Count>,
}

impl GlobalCounts {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every count of `partial`.
    ///
    /// Either all of `partial` is applied or, on overflow, none of it is.
    pub fn merge(&mut self, partial: PartialCounts) -> Result<()> {
        for (word, count) in partial.iter() {
            let current = self.get(word);
            if current.checked_add(count).is_none() {
                return Err(TopWordsError::CountOverflow {
                    word: word.to_owned(),
                });
            }
        }

        for (word, count) in partial {
            *self.counts.entry(word).or_insert(0) += count;
        }
        Ok(())
    }

    /// Merge a sequence of partial maps, stopping at the first overflow
    pub fn merge_all<I>(&mut self, partials: I) -> Result<()>
    where
        I: IntoIterator<Item = PartialCounts>,
    {
        for partial in partials {
            self.merge(partial)?;
        }
        Ok(())
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, Count)> + '_ {
        self.counts.iter().map(|(word, &count)| (word.as_str(), count))
    }

    /// Absorb another map with disjoint or overlapping keys
    pub(crate) fn absorb(&mut self, other: GlobalCounts) -> Result<()> {
        let mut carrier = PartialCounts::new(0);
        for (word, count) in other.counts {
            carrier.record_n(&word, count)?;
        }
        self.merge(carrier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn partial(chunk: u64, text: &str) -> PartialCounts {
        PartialCounts::from_text(chunk, text, &Tokenizer::new()).unwrap()
    }

    #[test]
    fn test_two_chunk_scenario() {
        let mut global = GlobalCounts::new();
        global.merge(partial(0, "elephant elephant giraffe")).unwrap();
        global.merge(partial(1, "elephant; giraffe, giraffe!!")).unwrap();

        assert_eq!(global.len(), 2);
        // "elephant" appears twice in A and once in B
        assert_eq!(global.get("elephant"), 3);
        assert_eq!(global.get("giraffe"), 3);
        assert_eq!(global.total(), 6);
    }

    #[test]
    fn test_merge_order_independent() {
        let chunks = [
            "tomorrow and tomorrow and tomorrow",
            "creeps in this petty pace from day to day",
            "to the last syllable of recorded time tomorrow",
        ];

        let mut forward = GlobalCounts::new();
        forward
            .merge_all(chunks.iter().enumerate().map(|(i, c)| partial(i as u64, c)))
            .unwrap();

        let mut backward = GlobalCounts::new();
        backward
            .merge_all(
                chunks
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, c)| partial(i as u64, c)),
            )
            .unwrap();

        let mut whole = GlobalCounts::new();
        whole.merge(partial(0, &chunks.join(" "))).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, whole);
        assert_eq!(whole.get("tomorrow"), 4);
    }

    #[test]
    fn test_double_merge_halves_back() {
        let single_input = partial(0, "penguins penguins walruses albatross albatross albatross");

        let mut single = GlobalCounts::new();
        single.merge(single_input.clone()).unwrap();

        let mut doubled = GlobalCounts::new();
        doubled.merge(single_input.clone()).unwrap();
        doubled.merge(single_input).unwrap();

        let mut halved = PartialCounts::new(0);
        for (word, count) in doubled.iter() {
            assert_eq!(count % 2, 0);
            halved.record_n(word, count / 2).unwrap();
        }
        let mut halved_global = GlobalCounts::new();
        halved_global.merge(halved).unwrap();
        assert_eq!(halved_global, single);
    }

    #[test]
    fn test_overflow_is_all_or_nothing() {
        let mut global = GlobalCounts::new();
        let mut big = PartialCounts::new(0);
        big.record_n("giraffes", u64::MAX - 1).unwrap();
        global.merge(big).unwrap();

        let mut next = PartialCounts::new(1);
        next.record("elephants").unwrap();
        next.record_n("giraffes", 2).unwrap();

        let err = global.merge(next).unwrap_err();
        assert_eq!(
            err,
            TopWordsError::CountOverflow {
                word: "giraffes".into()
            }
        );
        assert_eq!(global.get("giraffes"), u64::MAX - 1);
        assert_eq!(global.get("elephants"), 0);
    }

    #[test]
    fn test_empty_merge() {
        let mut global = GlobalCounts::new();
        global.merge(PartialCounts::new(0)).unwrap();
        assert!(global.is_empty());
        assert_eq!(global.total(), 0);
    }

    #[test]
    fn test_absorb_sums_overlap() {
        let mut left = GlobalCounts::new();
        left.merge(partial(0, "elephant giraffe")).unwrap();
        let mut right = GlobalCounts::new();
        right.merge(partial(1, "giraffe penguins")).unwrap();

        left.absorb(right).unwrap();
        assert_eq!(left.get("giraffe"), 2);
        assert_eq!(left.get("penguins"), 1);
        assert_eq!(left.get("elephant"), 1);
    }
}
