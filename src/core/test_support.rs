/*
 * Shared helpers for unit tests across the core modules.
 */
use crate::core::document::ParsedDocument;
use crate::core::parser::DocumentParser;
use crate::core::token_accounting::TokenAccountant;
use crate::core::tokenizer_utils::{TokenCounterOperations, TokenizerError};

/* Counts whitespace-separated words; deterministic and easy to reason about. */
pub struct WordCounter;

impl TokenCounterOperations for WordCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.split_whitespace().count())
    }

    fn name(&self) -> &'static str {
        "words"
    }
}

pub fn parse_with_words(text: &str) -> ParsedDocument {
    let accountant = TokenAccountant::new(&WordCounter, 1);
    DocumentParser::new(&accountant).parse(text)
}
