//! Turns raw text into candidate words.
//!
//! A token is a maximal run of characters that are neither whitespace nor one of
//! the punctuation separators below. Only tokens longer than the configured
//! minimum survive. Case is preserved and no Unicode segmentation is attempted.

use std::str::{Split, Utf8Chunks};

/// Tokens must be strictly longer than this many characters
pub const MIN_WORD_LEN: usize = 6;

/// Punctuation replaced by whitespace before splitting
pub const SEPARATORS: &[char] = &[
    '_', '|', '$', '#', '<', '>', '^', '=', '[', ']', '*', '/', '\\', ',', ';', '.', '-', ':',
    '(', ')', '?', '!', '"', '\'',
];

/// Returns true for characters that end a token
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || SEPARATORS.contains(&c)
}

/// Splits text into words longer than a minimum length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    min_len: usize,
}

impl Tokenizer {
    /// Create a tokenizer keeping words longer than [`MIN_WORD_LEN`]
    pub fn new() -> Self {
        Self {
            min_len: MIN_WORD_LEN,
        }
    }

    /// Create a tokenizer keeping words strictly longer than `min_len` characters
    pub fn with_min_len(min_len: usize) -> Self {
        Self { min_len }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Lazily yield the qualifying words of `text`
    pub fn tokenize<'a>(&self, text: &'a str) -> Tokens<'a> {
        Tokens {
            inner: text.split(is_separator as fn(char) -> bool),
            min_len: self.min_len,
        }
    }

    /// Lazily yield the qualifying words of raw bytes.
    ///
    /// Invalid UTF-8 sequences are skipped and behave like a separator, so the
    /// valid text on either side is still tokenized.
    pub fn tokenize_bytes<'a>(&self, bytes: &'a [u8]) -> ByteTokens<'a> {
        ByteTokens {
            chunks: bytes.utf8_chunks(),
            current: None,
            min_len: self.min_len,
            invalid_sequences: 0,
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the words of a `&str`
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    inner: Split<'a, fn(char) -> bool>,
    min_len: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let min_len = self.min_len;
        self.inner
            .by_ref()
            .find(|token| token.len() > min_len && token.chars().count() > min_len)
    }
}

/// Iterator over the words of a byte slice, skipping invalid UTF-8
#[derive(Debug)]
pub struct ByteTokens<'a> {
    chunks: Utf8Chunks<'a>,
    current: Option<Tokens<'a>>,
    min_len: usize,
    invalid_sequences: u64,
}

impl<'a> ByteTokens<'a> {
    /// Number of invalid UTF-8 sequences skipped so far
    pub fn invalid_sequences(&self) -> u64 {
        self.invalid_sequences
    }
}

impl<'a> Iterator for ByteTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            if let Some(word) = self.current.as_mut().and_then(Iterator::next) {
                return Some(word);
            }

            let chunk = self.chunks.next()?;
            if !chunk.invalid().is_empty() {
                self.invalid_sequences += 1;
                tracing::trace!(
                    bytes = chunk.invalid().len(),
                    "skipping invalid utf-8 sequence"
                );
            }
            self.current = Some(Tokenizer::with_min_len(self.min_len).tokenize(chunk.valid()));
        }
    }
}
