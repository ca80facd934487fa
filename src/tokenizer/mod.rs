//! Character-level vocabulary and encoding.
//!
//! The vocabulary is the set of distinct characters across the training
//! documents, sorted so token ids are reproducible, plus one reserved
//! control token (id = number of characters) that marks both the start and
//! the end of a sequence. [`Vocab::encode`] wraps a document in that token;
//! a character missing from the vocabulary fails the call.

mod error;

use std::collections::{BTreeSet, HashMap};

pub use error::TokenizerError;

/// Display label for the control token in diagnostics and traces.
pub const CONTROL_LABEL: &str = "<END>";

/// Character vocabulary with a reserved control token.
#[derive(Clone, Debug)]
pub struct Vocab {
    chars: Vec<char>,
    char_to_id: HashMap<char, usize>,
}

impl Vocab {
    /// Builds a vocabulary from the distinct characters of `docs`, sorted
    /// lexicographically. Ids run `0..chars`, the control token is `chars`.
    #[must_use]
    pub fn from_docs<S: AsRef<str>>(docs: &[S]) -> Self {
        let unique: BTreeSet<char> = docs
            .iter()
            .flat_map(|d| d.as_ref().chars())
            .collect();
        let chars: Vec<char> = unique.into_iter().collect();
        let char_to_id = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Vocab { chars, char_to_id }
    }

    /// Number of tokens including the control token.
    #[must_use]
    pub fn size(&self) -> usize {
        self.chars.len() + 1
    }

    /// Id of the reserved control token (sequence start and end marker).
    #[must_use]
    pub fn control_id(&self) -> usize {
        self.chars.len()
    }

    /// The ordered characters backing ids `0..control_id`.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Id for a character, if it is in the vocabulary.
    #[must_use]
    pub fn get_id(&self, c: char) -> Option<usize> {
        self.char_to_id.get(&c).copied()
    }

    /// Human-readable label for a token id: the character itself, or
    /// [`CONTROL_LABEL`] for the control token (and anything past it).
    #[must_use]
    pub fn label(&self, id: usize) -> String {
        match self.chars.get(id) {
            Some(c) => c.to_string(),
            None => CONTROL_LABEL.to_string(),
        }
    }

    /// Encodes a document as token ids wrapped with the control token at
    /// both ends: the leading one signals "sequence starts", the trailing
    /// one is the end marker the model learns to predict.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::UnknownChar`] for any character not in the
    /// vocabulary.
    pub fn encode(&self, doc: &str) -> Result<Vec<usize>, TokenizerError> {
        let mut tokens = Vec::with_capacity(doc.chars().count() + 2);
        tokens.push(self.control_id());
        for c in doc.chars() {
            let id = self.get_id(c).ok_or(TokenizerError::UnknownChar(c))?;
            tokens.push(id);
        }
        tokens.push(self.control_id());
        Ok(tokens)
    }

    /// Decodes token ids to text, rendering the control token as its label.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::InvalidId`] for ids past the control token.
    pub fn decode(&self, ids: &[usize]) -> Result<String, TokenizerError> {
        let mut out = String::new();
        for &id in ids {
            if id > self.control_id() {
                return Err(TokenizerError::InvalidId(id));
            }
            out.push_str(&self.label(id));
        }
        Ok(out)
    }
}
