//! Fixed-capacity token buffer for one generation call.
//!
//! ```text
//! [ prompt ........ | committed ..... | drafts ... | pad ........ ]
//! 0            prompt_len         position              capacity
//! ```
//!
//! Positions before `prompt_len` never change. Positions in
//! `[prompt_len, position)` hold committed output. Positions at or past
//! `position` hold drafts written during the current round, or the pad id.

use crate::error::{Error, Result};

/// Context length assumed when the target model doesn't report one.
pub const DEFAULT_MAX_CONTEXT_LEN: usize = 1024;

/// Token buffer shared by the drafter and the target during one call.
///
/// # Example
///
/// ```
/// use spec_decode::core::TokenBuffer;
///
/// let mut buffer = TokenBuffer::new(&[5, 6, 7], 6, 0).unwrap();
/// assert_eq!(buffer.remaining(), 3);
///
/// buffer.write_draft(0, 11);
/// buffer.write_draft(1, 12);
/// buffer.commit(1, 2, 20);
/// assert_eq!(buffer.generated(), &[11, 20]);
/// assert_eq!(buffer.position(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct TokenBuffer {
    /// Prompt, output and pad, `capacity` entries long.
    tokens: Vec<u32>,
    /// Number of prompt tokens.
    prompt_len: usize,
    /// First position without a committed token.
    position: usize,
    /// Pad id for uncommitted positions.
    pad_token_id: u32,
}

impl TokenBuffer {
    /// Create a buffer holding `prompt` with room for `capacity` tokens.
    pub fn new(prompt: &[u32], capacity: usize, pad_token_id: u32) -> Result<Self> {
        if prompt.is_empty() {
            return Err(Error::Config("prompt must contain at least one token".into()));
        }
        if prompt.len() >= capacity {
            return Err(Error::Config(format!(
                "prompt of {} tokens leaves no room in a buffer of {}",
                prompt.len(),
                capacity
            )));
        }

        let mut tokens = vec![pad_token_id; capacity];
        tokens[..prompt.len()].copy_from_slice(prompt);

        Ok(Self {
            tokens,
            prompt_len: prompt.len(),
            position: prompt.len(),
            pad_token_id,
        })
    }

    /// Size a buffer as `min(max_context_len, prompt + max_new_tokens)`.
    pub fn for_generation(
        prompt: &[u32],
        max_context_len: usize,
        max_new_tokens: usize,
        pad_token_id: u32,
    ) -> Result<Self> {
        let capacity = max_context_len.min(prompt.len() + max_new_tokens);
        Self::new(prompt, capacity, pad_token_id)
    }

    // ========== Getters ==========

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.tokens.len()
    }

    /// Number of prompt tokens.
    pub fn prompt_len(&self) -> usize {
        self.prompt_len
    }

    /// First uncommitted position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Slots left after the committed tokens.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.position
    }

    /// Whether every slot holds a committed token.
    pub fn is_full(&self) -> bool {
        self.position >= self.capacity()
    }

    /// Pad id.
    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    /// The first `end` tokens, drafts included.
    pub fn prefix(&self, end: usize) -> &[u32] {
        &self.tokens[..end]
    }

    /// Prompt plus committed output.
    pub fn committed(&self) -> &[u32] {
        &self.tokens[..self.position]
    }

    /// Committed output, prompt excluded.
    pub fn generated(&self) -> &[u32] {
        &self.tokens[self.prompt_len..self.position]
    }

    /// The `len` tokens written past the committed position.
    pub fn drafts(&self, len: usize) -> &[u32] {
        &self.tokens[self.position..self.position + len]
    }

    /// Every slot, pad included.
    pub fn as_slice(&self) -> &[u32] {
        &self.tokens
    }

    // ========== Mutation ==========

    /// Write a speculative token `offset` slots past the committed position.
    ///
    /// # Panics
    ///
    /// Panics if the slot lies past the buffer's capacity.
    pub fn write_draft(&mut self, offset: usize, token: u32) {
        self.tokens[self.position + offset] = token;
    }

    /// Commit one token directly.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full.
    pub fn push(&mut self, token: u32) {
        self.tokens[self.position] = token;
        self.position += 1;
    }

    /// Commit `count` drafts as they were written.
    pub fn accept(&mut self, count: usize) {
        debug_assert!(self.position + count <= self.capacity());
        self.position += count;
    }

    /// Close a round: keep `accepted` of `drafted` drafts, pad the rejected
    /// ones, and write `token` right after the accepted span.
    pub fn commit(&mut self, accepted: usize, drafted: usize, token: u32) {
        debug_assert!(accepted <= drafted);
        let start = self.position + accepted;
        let end = self.position + drafted;
        self.tokens[start..end].fill(self.pad_token_id);
        self.tokens[start] = token;
        self.position = start + 1;
    }
}
