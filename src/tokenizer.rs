// tokenizer.rs
// Description: Word tokenizer and the bounded token dictionary of the sequence model.
// History:
// - 2026-10-06: Vocabulary keeps the index of tokens it has already seen and stops
//               assigning at capacity; unknown tokens resolve to index 0.
// Author: handgrad contributors

use std::collections::HashMap;

/// Splits text into tokens.
pub trait Tokenizer {
    fn tokenize(&self, s_text: &str) -> Vec<String>;
}

/// Splits on every run of characters that are neither alphanumeric nor `_`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, s_text: &str) -> Vec<String> {
        s_text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Lower-cased token to row index dictionary with a fixed capacity.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    m_encode: HashMap<String, usize>,
    v_words: Vec<String>,
    i_capacity: usize,
}

impl Vocabulary {
    pub fn new(i_capacity: usize) -> Self {
        Self {
            m_encode: HashMap::new(),
            v_words: Vec::new(),
            i_capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.v_words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v_words.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.i_capacity
    }

    /// Index of `s_token`, assigning the next free one if it is new.
    ///
    /// Returns `None` when the token is new and the vocabulary is full.
    pub fn assign(&mut self, s_token: &str) -> Option<usize> {
        let s_key = s_token.to_lowercase();
        if let Some(&i_idx) = self.m_encode.get(&s_key) {
            return Some(i_idx);
        }
        if self.v_words.len() >= self.i_capacity {
            return None;
        }
        let i_idx = self.v_words.len();
        self.m_encode.insert(s_key.clone(), i_idx);
        self.v_words.push(s_key);
        Some(i_idx)
    }

    /// Index of `s_token`, or 0 when it was never assigned.
    pub fn index_of(&self, s_token: &str) -> usize {
        self.m_encode
            .get(&s_token.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn contains(&self, s_token: &str) -> bool {
        self.m_encode.contains_key(&s_token.to_lowercase())
    }

    pub fn token_at(&self, i_idx: usize) -> Option<&str> {
        self.v_words.get(i_idx).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_whitespace() {
        let v = WordTokenizer.tokenize("Hello, world! how_are  you-today?");
        assert_eq!(v, vec!["Hello", "world", "how_are", "you", "today"]);
        assert!(WordTokenizer.tokenize(" ,.! ").is_empty());
    }

    #[test]
    fn tokens_are_case_insensitive_and_stable() {
        let mut vocab = Vocabulary::new(10);
        assert_eq!(vocab.assign("Hello"), Some(0));
        assert_eq!(vocab.assign("world"), Some(1));
        assert_eq!(vocab.assign("HELLO"), Some(0));
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.token_at(0), Some("hello"));
        assert_eq!(vocab.index_of("World"), 1);
    }

    #[test]
    fn unknown_tokens_resolve_to_zero() {
        let mut vocab = Vocabulary::new(2);
        vocab.assign("a");
        vocab.assign("b");
        assert_eq!(vocab.assign("c"), None);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.index_of("c"), 0);
        assert!(!vocab.contains("c"));
        assert_eq!(vocab.token_at(2), None);
    }
}
