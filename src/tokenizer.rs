//! BPE token counting for the chunker.
//!
//! Uses the `o200k_base` encoding shared by the gpt-4o model family, so
//! chunk budgets line up with what the chat model sees.

use anyhow::Result;
use tiktoken_rs::CoreBPE;

use repochat_core::chunk::TokenCounter;

pub struct BpeTokenCounter {
    bpe: CoreBPE,
}

impl BpeTokenCounter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::o200k_base()?,
        })
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}
