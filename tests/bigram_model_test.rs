//! Integration tests for the bigram table model.

use candle_core::{Device, Tensor};
use spec_decode::core::{ContextCache, IncrementalState};
use spec_decode::model::bigram::DEFAULT_TENSOR_NAME;
use spec_decode::{BigramModel, Error, ModelAdapter};

#[test]
fn test_safetensors_round_trip() {
    let device = Device::Cpu;
    let model = BigramModel::from_corpus(&[0, 1, 2, 3, 0, 1, 3], 4, 0.5, &device).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.safetensors");
    model.save_safetensors(&path, DEFAULT_TENSOR_NAME).unwrap();

    let loaded = BigramModel::from_safetensors(&path, DEFAULT_TENSOR_NAME, &device).unwrap();
    let original: Vec<Vec<f32>> = model.logits().to_vec2().unwrap();
    let restored: Vec<Vec<f32>> = loaded.logits().to_vec2().unwrap();
    assert_eq!(original, restored);
    assert_eq!(loaded.vocab_size(), 4);
}

#[test]
fn test_safetensors_missing_tensor() {
    let device = Device::Cpu;
    let model = BigramModel::from_corpus(&[0, 1], 2, 1.0, &device).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.safetensors");
    model.save_safetensors(&path, "weights").unwrap();

    assert!(matches!(
        BigramModel::from_safetensors(&path, DEFAULT_TENSOR_NAME, &device),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_corpus_counts() {
    let device = Device::Cpu;
    let model = BigramModel::from_corpus(&[0, 1, 0, 1, 0, 2], 3, 1.0, &device).unwrap();

    let row: Vec<f32> = model.logits().get(0).unwrap().to_vec1().unwrap();
    // 0 -> 1 twice, 0 -> 2 once, 0 -> 0 never; add-one smoothing
    assert!((row[0] - 1.0f32.ln()).abs() < 1e-6);
    assert!((row[1] - 3.0f32.ln()).abs() < 1e-6);
    assert!((row[2] - 2.0f32.ln()).abs() < 1e-6);
}

#[test]
fn test_corpus_validation() {
    let device = Device::Cpu;
    assert!(BigramModel::from_corpus(&[0, 1], 0, 1.0, &device).is_err());
    assert!(BigramModel::from_corpus(&[0, 1], 2, 0.0, &device).is_err());
    assert!(BigramModel::from_corpus(&[0, 2], 2, 1.0, &device).is_err());
}

#[test]
fn test_rows_follow_new_tokens() {
    let device = Device::Cpu;
    let table = Tensor::new(&[[1.0f32, 2.0], [3.0, 4.0]], &device).unwrap();
    let model = BigramModel::new(table).unwrap();

    let state = ContextCache::from_tokens(vec![0, 1]);
    let out = model.advance(&[0, 1, 1, 0], Some(state)).unwrap();
    let rows: Vec<Vec<f32>> = out.logits.to_vec2().unwrap();
    assert_eq!(rows, vec![vec![3.0, 4.0], vec![1.0, 2.0]]);
    assert_eq!(out.state.seen_len(), 4);
}

#[test]
fn test_out_of_vocab_token() {
    let device = Device::Cpu;
    let model = BigramModel::from_corpus(&[0, 1], 2, 1.0, &device).unwrap();
    assert!(matches!(model.advance(&[0, 5], None), Err(Error::Adapter(_))));
}

#[test]
fn test_context_limit() {
    let device = Device::Cpu;
    let model = BigramModel::from_corpus(&[0, 1], 2, 1.0, &device).unwrap();
    assert_eq!(model.max_context_len(), None);
    assert_eq!(model.with_max_context_len(16).max_context_len(), Some(16));
}
