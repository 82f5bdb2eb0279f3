//! Unit tests for RejectionSampler.

use candle_core::{DType, Device, Tensor};
use spec_decode::speculative::{residual_distribution, RejectionSampler};

fn uniform(k: usize, vocab_size: usize, device: &Device) -> Tensor {
    (Tensor::ones((k, vocab_size), DType::F32, device).unwrap() / vocab_size as f64).unwrap()
}

#[test]
fn test_sampler_creation() {
    let sampler = RejectionSampler::new();
    assert!(format!("{sampler:?}").contains("RejectionSampler"));

    let seeded = RejectionSampler::with_seed(42);
    assert!(format!("{seeded:?}").contains("RejectionSampler"));
}

#[test]
fn test_accept_all_when_same_distribution() {
    let device = Device::Cpu;
    let mut sampler = RejectionSampler::with_seed(42);

    let probs = uniform(4, 100, &device);
    let draft_tokens: Vec<u32> = vec![10, 20, 30, 40];

    // p == q everywhere, so every ratio is exactly 1
    let n = sampler
        .accepted_prefix_len(&draft_tokens, &probs, &probs)
        .unwrap();
    assert_eq!(n, 4);
}

#[test]
fn test_reject_when_target_gives_no_mass() {
    let device = Device::Cpu;
    let mut sampler = RejectionSampler::with_seed(42);

    let draft = Tensor::new(&[[0.9f32, 0.1, 0.0], [0.5, 0.5, 0.0]], &device).unwrap();
    let target = Tensor::new(&[[0.0f32, 0.5, 0.5], [0.5, 0.5, 0.0]], &device).unwrap();

    let n = sampler.accepted_prefix_len(&[0, 1], &draft, &target).unwrap();
    assert_eq!(n, 0);
}

#[test]
fn test_accept_when_target_dominates() {
    let device = Device::Cpu;
    let mut sampler = RejectionSampler::with_seed(7);

    // p(x) >= q(x) for every drafted token
    let draft = Tensor::new(&[[0.2f32, 0.8], [0.6, 0.4], [0.1, 0.9]], &device).unwrap();
    let target = Tensor::new(&[[0.9f32, 0.1], [0.7, 0.3], [0.05, 0.95]], &device).unwrap();

    for _ in 0..20 {
        let n = sampler.accepted_prefix_len(&[0, 0, 1], &draft, &target).unwrap();
        assert_eq!(n, 3);
    }
}

#[test]
fn test_empirical_acceptance_rate() {
    let device = Device::Cpu;
    let mut sampler = RejectionSampler::with_seed(2024);

    // Token 0 is accepted with probability p/q = 0.25 / 0.5
    let draft = Tensor::new(&[[0.5f32, 0.5]], &device).unwrap();
    let target = Tensor::new(&[[0.25f32, 0.75]], &device).unwrap();

    let trials = 4000;
    let accepted: usize = (0..trials)
        .map(|_| sampler.accepted_prefix_len(&[0], &draft, &target).unwrap())
        .sum();
    let rate = accepted as f32 / trials as f32;
    assert!((rate - 0.5).abs() < 0.04, "rate = {rate}");
}

#[test]
fn test_empty_draft() {
    let device = Device::Cpu;
    let mut sampler = RejectionSampler::with_seed(0);
    let empty = Tensor::zeros((0, 5), DType::F32, &device).unwrap();
    assert_eq!(sampler.accepted_prefix_len(&[], &empty, &empty).unwrap(), 0);
}

#[test]
fn test_shape_validation() {
    let device = Device::Cpu;
    let mut sampler = RejectionSampler::new();

    let draft = Tensor::zeros((3, 10), DType::F32, &device).unwrap();
    let target = Tensor::zeros((4, 10), DType::F32, &device).unwrap();
    assert!(sampler.accepted_prefix_len(&[1, 2, 3], &draft, &target).is_err());

    let target = Tensor::zeros((3, 10), DType::F32, &device).unwrap();
    assert!(sampler.accepted_prefix_len(&[1, 2], &draft, &target).is_err());
}

#[test]
fn test_reproducibility_with_seed() {
    let device = Device::Cpu;

    let draft = candle_nn::ops::softmax(
        &Tensor::randn(0.0f32, 1.0, (4, 50), &device).unwrap(),
        1,
    )
    .unwrap();
    let target = candle_nn::ops::softmax(
        &Tensor::randn(0.0f32, 1.0, (4, 50), &device).unwrap(),
        1,
    )
    .unwrap();
    let draft_tokens: Vec<u32> = vec![5, 10, 15, 20];

    let mut sampler1 = RejectionSampler::with_seed(42);
    let mut sampler2 = RejectionSampler::with_seed(42);
    for _ in 0..10 {
        let n1 = sampler1.accepted_prefix_len(&draft_tokens, &draft, &target).unwrap();
        let n2 = sampler2.accepted_prefix_len(&draft_tokens, &draft, &target).unwrap();
        assert_eq!(n1, n2);
    }
}

#[test]
fn test_residual_is_normalized() {
    let device = Device::Cpu;
    let target = Tensor::new(&[0.1f32, 0.4, 0.3, 0.2], &device).unwrap();
    let draft = Tensor::new(&[0.4f32, 0.1, 0.1, 0.4], &device).unwrap();

    let residual: Vec<f32> = residual_distribution(&target, &draft)
        .unwrap()
        .to_vec1()
        .unwrap();

    // max(0, p - q) = [0, 0.3, 0.2, 0] over a total of 0.5
    assert_eq!(residual[0], 0.0);
    assert!((residual[1] - 0.6).abs() < 1e-5);
    assert!((residual[2] - 0.4).abs() < 1e-5);
    assert_eq!(residual[3], 0.0);
}
