//! Key/value cache for transformer-style adapters.
//!
//! Each layer keeps the keys and values of every processed position,
//! concatenated along the sequence axis.
//!
//! ## Memory Layout
//!
//! Per layer, keys and values both have shape
//! `[batch, num_kv_heads, seq_len, head_dim]`. Pruning narrows `seq_len`
//! on every layer at once.

use candle_core::Tensor;

use super::state::{check_prune, IncrementalState};
use crate::error::{Error, Result};

/// Axis holding the sequence positions.
pub const SEQ_DIM: usize = 2;

/// Cached keys and values for one transformer layer.
#[derive(Debug, Clone, Default)]
pub struct LayerKvCache {
    /// Cached keys: [batch, num_kv_heads, seq_len, head_dim]
    keys: Option<Tensor>,
    /// Cached values: [batch, num_kv_heads, seq_len, head_dim]
    values: Option<Tensor>,
}

impl LayerKvCache {
    /// Create an empty layer cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new keys and values; returns the full cached tensors.
    pub fn update(&mut self, new_k: &Tensor, new_v: &Tensor) -> Result<(Tensor, Tensor)> {
        let (k, v) = match (&self.keys, &self.values) {
            (Some(cached_k), Some(cached_v)) => {
                let k = Tensor::cat(&[cached_k, new_k], SEQ_DIM)?;
                let v = Tensor::cat(&[cached_v, new_v], SEQ_DIM)?;
                (k, v)
            }
            _ => (new_k.clone(), new_v.clone()),
        };

        self.keys = Some(k.clone());
        self.values = Some(v.clone());

        Ok((k, v))
    }

    /// Number of cached positions.
    pub fn len(&self) -> usize {
        self.keys
            .as_ref()
            .map(|k| k.dim(SEQ_DIM).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys, if any.
    pub fn keys(&self) -> Option<&Tensor> {
        self.keys.as_ref()
    }

    /// Cached values, if any.
    pub fn values(&self) -> Option<&Tensor> {
        self.values.as_ref()
    }

    /// Keep only the first `len` positions.
    fn truncate(&mut self, len: usize) -> Result<()> {
        if len == 0 {
            self.keys = None;
            self.values = None;
            return Ok(());
        }
        if let Some(k) = &self.keys {
            self.keys = Some(k.narrow(SEQ_DIM, 0, len)?);
        }
        if let Some(v) = &self.values {
            self.values = Some(v.narrow(SEQ_DIM, 0, len)?);
        }
        Ok(())
    }
}

/// Key/value cache across all layers of one model.
#[derive(Debug, Clone)]
pub struct KvCache {
    layers: Vec<LayerKvCache>,
}

impl KvCache {
    /// Create an empty cache with `num_layers` layers.
    pub fn new(num_layers: usize) -> Self {
        Self {
            layers: (0..num_layers).map(|_| LayerKvCache::new()).collect(),
        }
    }

    /// Build a cache from per-layer `(keys, values)` pairs.
    ///
    /// All layers must cover the same number of positions.
    pub fn from_layers(layers: Vec<(Tensor, Tensor)>) -> Result<Self> {
        let mut cache = Self::new(layers.len());
        for (layer, (k, v)) in cache.layers.iter_mut().zip(&layers) {
            layer.update(k, v)?;
        }
        cache.check_aligned()?;
        Ok(cache)
    }

    /// Get the cache for a specific layer.
    pub fn layer(&self, layer_idx: usize) -> Option<&LayerKvCache> {
        self.layers.get(layer_idx)
    }

    /// Get mutable access to a layer's cache.
    pub fn layer_mut(&mut self, layer_idx: usize) -> Option<&mut LayerKvCache> {
        self.layers.get_mut(layer_idx)
    }

    /// Get the number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Ensure every layer holds the same number of positions.
    fn check_aligned(&self) -> Result<()> {
        let lens: Vec<usize> = self.layers.iter().map(LayerKvCache::len).collect();
        if let Some(&first) = lens.first() {
            if lens.iter().any(|&len| len != first) {
                return Err(Error::Config(format!(
                    "kv cache layers disagree on length: {lens:?}"
                )));
            }
        }
        Ok(())
    }
}

impl IncrementalState for KvCache {
    fn seen_len(&self) -> usize {
        self.layers.first().map_or(0, LayerKvCache::len)
    }

    fn prune(mut self, num_tokens: usize) -> Result<Self> {
        let seen = self.seen_len();
        check_prune(num_tokens, seen)?;
        if num_tokens == 0 {
            return Ok(self);
        }
        for layer in &mut self.layers {
            layer.truncate(seen - num_tokens)?;
        }
        Ok(self)
    }
}
