/*
 * This module provides utilities for token counting.
 * It defines an abstraction `TokenCounterOperations` for counting tokens in a string,
 * and concrete implementations: `CoreTikTokenCounter` that uses the `tiktoken-rs`
 * library and `ApproximateTokenCounter` for a heuristic estimate that needs no
 * vocabulary. This allows the token accounting to stay agnostic of the backend and
 * lets tests inject deterministic counters.
 */
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tiktoken_rs::{CoreBPE, o200k_base};

#[derive(Debug)]
pub enum TokenizerError {
    InitializationFailed(String),
    EncodingFailed(String),
}

impl std::fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenizerError::InitializationFailed(msg) => {
                write!(f, "Tokenizer initialization failed: {msg}")
            }
            TokenizerError::EncodingFailed(msg) => write!(f, "Tokenizer failed to encode: {msg}"),
        }
    }
}

impl std::error::Error for TokenizerError {}

/*
 * Defines the contract for a service that can count tokens in a given text string.
 * Implementations must be deterministic for a given input and return 0 for the
 * empty string. A failure is reported per call so that callers can substitute an
 * estimate for the affected text only.
 */
pub trait TokenCounterOperations: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError>;

    /* Short human readable name used in status output and logs. */
    fn name(&self) -> &'static str;
}

/*
 * Selects which tokenizer backend to use. Persisted in the configuration file
 * and accepted as the `--tokenizer` command line value.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Tiktoken,
    Approximate,
}

/*
 * Longest whitespace-free run the BPE encoder is given. Encoding time grows
 * quadratically with run length, so texts holding a longer run (inline base64,
 * minified data) are rejected and the caller estimates them instead.
 */
pub const MAX_UNBROKEN_RUN_BYTES: usize = 64 * 1024;

/*
 * A concrete implementation of `TokenCounterOperations` that uses the `tiktoken-rs`
 * library with the "o200k_base" encoding, the vocabulary used by GPT-4o.
 * The BPE tables are loaded once at construction.
 */
pub struct CoreTikTokenCounter {
    bpe: CoreBPE,
}

impl CoreTikTokenCounter {
    pub fn new() -> Result<Self, TokenizerError> {
        let bpe = o200k_base()
            .map_err(|e| TokenizerError::InitializationFailed(format!("o200k_base: {e}")))?;
        Ok(CoreTikTokenCounter { bpe })
    }
}

impl TokenCounterOperations for CoreTikTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        if text.is_empty() {
            return Ok(0);
        }
        if let Some(run) = text
            .split_whitespace()
            .map(str::len)
            .find(|&len| len > MAX_UNBROKEN_RUN_BYTES)
        {
            return Err(TokenizerError::EncodingFailed(format!(
                "unbroken run of {run} bytes exceeds the {MAX_UNBROKEN_RUN_BYTES} byte limit"
            )));
        }
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }

    fn name(&self) -> &'static str {
        "tiktoken (o200k_base)"
    }
}

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,!?;:"'()\[\]{}]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static URL_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+|\S+\.\S+").unwrap());

/*
 * Estimates tokens without a vocabulary. Words, punctuation marks and whitespace
 * runs each count as one token, URL-like fragments add three, and the sum is
 * scaled by 1.3 (rounded up) to account for subword splitting.
 */
pub struct ApproximateTokenCounter;

impl ApproximateTokenCounter {
    pub fn new() -> Self {
        ApproximateTokenCounter
    }

    /*
     * Infallible variant used by the accountant when another backend fails.
     */
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let words = WORD_RE.find_iter(text).count();
        let punctuation = PUNCTUATION_RE.find_iter(text).count();
        let whitespace = WHITESPACE_RE.find_iter(text).count();
        let url_like = URL_LIKE_RE.find_iter(text).count() * 3;
        let raw = words + punctuation + whitespace + url_like;
        // ceil(raw * 1.3) in integer arithmetic
        (raw * 13).div_ceil(10)
    }
}

impl Default for ApproximateTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for ApproximateTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.estimate(text))
    }

    fn name(&self) -> &'static str {
        "approximate"
    }
}

/*
 * Builds the requested token counter. If the exact tokenizer cannot be
 * initialised, the error is logged and the approximate counter is returned so
 * that the application stays usable with estimated counts.
 */
pub fn create_token_counter(kind: TokenizerKind) -> Box<dyn TokenCounterOperations> {
    match kind {
        TokenizerKind::Tiktoken => match CoreTikTokenCounter::new() {
            Ok(counter) => {
                log::debug!("TokenizerUtils: Using tiktoken o200k_base tokenizer.");
                Box::new(counter)
            }
            Err(e) => {
                log::error!("TokenizerUtils: {e}. Falling back to approximate token counts.");
                Box::new(ApproximateTokenCounter::new())
            }
        },
        TokenizerKind::Approximate => {
            log::debug!("TokenizerUtils: Using approximate tokenizer.");
            Box::new(ApproximateTokenCounter::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Tests for ApproximateTokenCounter ---
    #[test]
    fn test_approximate_counter_empty_string() {
        let counter = ApproximateTokenCounter::new();
        assert_eq!(counter.count_tokens("").unwrap(), 0);
    }

    #[test]
    fn test_approximate_counter_words_and_space() {
        let counter = ApproximateTokenCounter::new();
        // 2 words + 1 whitespace run = 3, scaled -> 4
        assert_eq!(counter.count_tokens("hello world").unwrap(), 4);
    }

    #[test]
    fn test_approximate_counter_with_punctuation() {
        let counter = ApproximateTokenCounter::new();
        // 2 words + 2 punctuation + 1 whitespace = 5, scaled -> 7
        assert_eq!(counter.count_tokens("Hello, world!").unwrap(), 7);
    }

    #[test]
    fn test_approximate_counter_url_like_fragment() {
        let counter = ApproximateTokenCounter::new();
        // 4 words + 1 punctuation + 2 whitespace + 3 (url-like) = 10, scaled -> 13
        assert_eq!(counter.count_tokens("docs.rs is great").unwrap(), 13);
    }

    #[test]
    fn test_approximate_counter_is_deterministic() {
        let counter = ApproximateTokenCounter::new();
        let text = "# Title\nSome text, with [links](https://example.com).";
        assert_eq!(counter.estimate(text), counter.estimate(text));
    }

    // --- Tests for CoreTikTokenCounter ---

    #[test]
    fn test_core_tiktoken_counter_empty_string() {
        let counter = CoreTikTokenCounter::new().unwrap();
        assert_eq!(counter.count_tokens("").unwrap(), 0);
    }

    #[test]
    fn test_core_tiktoken_counter_simple_text() {
        let counter = CoreTikTokenCounter::new().unwrap();
        // "hello" " world"
        assert_eq!(counter.count_tokens("hello world").unwrap(), 2);
    }

    #[test]
    fn test_core_tiktoken_counter_more_text_more_tokens() {
        let counter = CoreTikTokenCounter::new().unwrap();
        let short = counter.count_tokens("A short sentence.").unwrap();
        let long = counter
            .count_tokens("A short sentence. Followed by a second, somewhat longer sentence.")
            .unwrap();
        assert!(long > short);
    }

    #[test]
    fn test_core_tiktoken_counter_rejects_oversized_unbroken_run() {
        let counter = CoreTikTokenCounter::new().unwrap();
        let blob = format!("data: {}", "A".repeat(MAX_UNBROKEN_RUN_BYTES + 1));
        assert!(matches!(
            counter.count_tokens(&blob),
            Err(TokenizerError::EncodingFailed(_))
        ));
        let short_words = "A ".repeat(10);
        assert!(counter.count_tokens(&short_words).is_ok());
    }

    #[test]
    fn test_create_token_counter_respects_kind() {
        let counter = create_token_counter(TokenizerKind::Approximate);
        assert_eq!(counter.name(), "approximate");
        assert_eq!(counter.count_tokens("hello world").unwrap(), 4);
    }

    #[test]
    fn test_tokenizer_kind_serialization() {
        let json = serde_json::to_string(&TokenizerKind::Approximate).unwrap();
        assert_eq!(json, "\"approximate\"");
        let kind: TokenizerKind = serde_json::from_str("\"tiktoken\"").unwrap();
        assert_eq!(kind, TokenizerKind::Tiktoken);
    }

    #[test]
    fn test_tokenizer_kind_command_line_values_match_config_names() {
        for kind in TokenizerKind::value_variants() {
            let name = kind.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(serde_json::to_string(kind).unwrap(), format!("\"{name}\""));
            assert_eq!(TokenizerKind::from_str(&name, false).unwrap(), *kind);
        }
    }
}
