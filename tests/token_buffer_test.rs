//! Integration tests for TokenBuffer.

use spec_decode::core::{TokenBuffer, DEFAULT_MAX_CONTEXT_LEN};

#[test]
fn test_default_context_cap() {
    let prompt = vec![1u32; 10];
    let buffer = TokenBuffer::for_generation(&prompt, DEFAULT_MAX_CONTEXT_LEN, 5000, 0).unwrap();
    assert_eq!(buffer.capacity(), DEFAULT_MAX_CONTEXT_LEN);
    assert_eq!(buffer.remaining(), DEFAULT_MAX_CONTEXT_LEN - 10);
}

#[test]
fn test_rounds_advance_position() {
    let mut buffer = TokenBuffer::new(&[9, 9], 10, 0).unwrap();

    // Round 1: three drafts, two accepted, replacement written after them
    for (i, t) in [1, 2, 3].into_iter().enumerate() {
        buffer.write_draft(i, t);
    }
    buffer.commit(2, 3, 7);
    assert_eq!(buffer.position(), 5);
    assert_eq!(buffer.generated(), &[1, 2, 7]);

    // Round 2: all accepted plus a bonus
    buffer.write_draft(0, 4);
    buffer.write_draft(1, 5);
    buffer.commit(2, 2, 6);
    assert_eq!(buffer.position(), 8);
    assert_eq!(buffer.generated(), &[1, 2, 7, 4, 5, 6]);
    assert_eq!(buffer.remaining(), 2);
}

#[test]
fn test_rejected_drafts_are_padded() {
    let mut buffer = TokenBuffer::new(&[3], 6, 99).unwrap();
    for (i, t) in [10, 11, 12, 13].into_iter().enumerate() {
        buffer.write_draft(i, t);
    }
    buffer.commit(0, 4, 20);

    assert_eq!(buffer.as_slice(), &[3, 20, 99, 99, 99, 99]);
    assert_eq!(buffer.pad_token_id(), 99);
}

#[test]
fn test_prompt_is_untouched() {
    let prompt = [4, 5, 6];
    let mut buffer = TokenBuffer::new(&prompt, 8, 0).unwrap();
    buffer.push(1);
    buffer.write_draft(0, 2);
    buffer.commit(0, 1, 3);

    assert_eq!(buffer.prefix(3), &prompt);
    assert_eq!(buffer.prompt_len(), 3);
    assert_eq!(buffer.committed(), &[4, 5, 6, 1, 3]);
}
