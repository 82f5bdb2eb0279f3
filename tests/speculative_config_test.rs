//! Unit tests for SpeculativeConfig.

use std::io::Write;

use spec_decode::{Error, SpeculativeConfig};

#[test]
fn test_default_config() {
    let config = SpeculativeConfig::default();
    assert_eq!(config.num_speculative_tokens, 5);
    assert_eq!(config.max_new_tokens, 40);
    assert_eq!(config.eos_token_ids, vec![1]);
    assert_eq!(config.pad_token_id, 0);
    assert!(!config.use_cache);
    assert!(!config.skip_sample_adjustment);
    assert!(config.first_target);
    assert_eq!(config.seed, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder_pattern() {
    let config = SpeculativeConfig::new(3)
        .num_tokens(8)
        .max_new_tokens(64)
        .eos_token_ids(vec![2, 3])
        .pad_token_id(9)
        .use_cache(true)
        .skip_sample_adjustment(true)
        .first_target(false)
        .seed(42);

    assert_eq!(config.num_speculative_tokens, 8);
    assert_eq!(config.max_new_tokens, 64);
    assert_eq!(config.eos_token_ids, vec![2, 3]);
    assert_eq!(config.pad_token_id, 9);
    assert!(config.use_cache);
    assert!(config.skip_sample_adjustment);
    assert!(!config.first_target);
    assert_eq!(config.seed, Some(42));
}

#[test]
fn test_single_eos() {
    let config = SpeculativeConfig::new(4).eos_token_id(50256);
    assert!(config.is_eos(50256));
    assert!(!config.is_eos(1));
}

#[test]
fn test_from_file_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"num_speculative_tokens": 3, "use_cache": true, "eos_token_ids": [7]}}"#
    )
    .unwrap();

    let config = SpeculativeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.num_speculative_tokens, 3);
    assert!(config.use_cache);
    assert_eq!(config.eos_token_ids, vec![7]);
    assert_eq!(config.max_new_tokens, 40);
    assert!(config.first_target);
}

#[test]
fn test_from_file_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(matches!(
        SpeculativeConfig::from_file(file.path()),
        Err(Error::Json(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        SpeculativeConfig::from_file(dir.path().join("missing.json")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_validate() {
    assert!(SpeculativeConfig::new(0).validate().is_err());
    assert!(SpeculativeConfig::new(1).max_new_tokens(0).validate().is_err());
    assert!(SpeculativeConfig::new(1).max_new_tokens(1).validate().is_ok());
}
