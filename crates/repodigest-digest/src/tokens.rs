//! Token count estimation.

use crate::error::{DigestError, Result};

/// Counts tokens in digest text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> Result<usize>;
}

/// `o200k_base` byte-pair encoding via `tiktoken-rs`.
#[cfg(feature = "tiktoken")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TiktokenCounter;

#[cfg(feature = "tiktoken")]
impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        use std::sync::OnceLock;

        static ENCODER: OnceLock<std::result::Result<tiktoken_rs::CoreBPE, String>> =
            OnceLock::new();

        let encoder = ENCODER
            .get_or_init(|| tiktoken_rs::o200k_base().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|message| DigestError::Token {
                message: message.clone(),
            })?;
        Ok(encoder.encode_with_special_tokens(text).len())
    }
}

/// Roughly four characters per token; no vocabulary needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.chars().count().div_ceil(4))
    }
}

/// The best counter compiled in.
pub fn default_counter() -> Box<dyn TokenCounter> {
    #[cfg(feature = "tiktoken")]
    {
        Box::new(TiktokenCounter)
    }
    #[cfg(not(feature = "tiktoken"))]
    {
        Box::new(HeuristicCounter)
    }
}

/// Human-readable token count: `999`, `1.2k`, `3.4M`.
pub fn format_token_count(tokens: usize) -> String {
    if tokens < 1_000 {
        return tokens.to_string();
    }
    // Round to tenths before picking the unit.
    let tenths_k = (tokens + 50) / 100;
    if tenths_k < 10_000 {
        format!("{}.{}k", tenths_k / 10, tenths_k % 10)
    } else {
        let tenths_m = (tokens + 50_000) / 100_000;
        format!("{}.{}M", tenths_m / 10, tenths_m % 10)
    }
}

/// Formatted estimate, or `None` when counting fails.
pub fn estimate(counter: &dyn TokenCounter, text: &str) -> Option<String> {
    match counter.count(text) {
        Ok(tokens) => Some(format_token_count(tokens)),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}
