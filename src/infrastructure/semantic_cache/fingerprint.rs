//! Coalescing fingerprints
//!
//! Near-duplicate concurrent queries should map to the same fingerprint so
//! only one answerer call runs for them. The quantization is best effort: a
//! false negative (two near-identical queries landing in different cells)
//! costs redundant work, never a wrong answer, so a coarse grid over a
//! prefix of the embedding is enough.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Components examined per fingerprint; embeddings shorter than this are
/// used in full
const FINGERPRINT_DIMS: usize = 64;

/// Cell width for component rounding
const GRID: f32 = 0.05;

/// Quantize an embedding into a 64-bit coalescing key
pub fn fingerprint(embedding: &[f32]) -> u64 {
    let mut hasher = DefaultHasher::new();

    for &component in embedding.iter().take(FINGERPRINT_DIMS) {
        let cell = (component / GRID).round() as i32;
        cell.hash(&mut hasher);
    }

    hasher.finish()
}
