//! Errors produced when encoding or decoding against a vocabulary.

use std::fmt;

/// Errors from vocabulary lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    /// A character outside the vocabulary was encountered during encode.
    /// Encoding fails fast instead of silently skipping the character.
    UnknownChar(char),

    /// A token id beyond the vocabulary (including the control token) was
    /// passed to decode.
    InvalidId(usize),
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerError::UnknownChar(c) => write!(f, "tokenizer: unknown character {c:?}"),
            TokenizerError::InvalidId(id) => write!(f, "tokenizer: invalid token id {id}"),
        }
    }
}

impl std::error::Error for TokenizerError {}
