//! Feature-hashing text embedder
//!
//! Lowercased alphanumeric tokens are hashed into a fixed number of buckets
//! and the resulting count vector is L2-normalised. Cosine similarity
//! between two embeddings is then a weighted token-overlap score.
//!
//! Buckets come from SHA-256, so vectors stored by one build stay
//! comparable with queries from any other.

use sha2::{Digest, Sha256};

/// Embedding width
pub const EMBEDDING_DIM: usize = 256;

/// Split into lowercase alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Bucket of one token: first 8 digest bytes, big-endian, modulo the width
pub fn bucket(token: &str) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % EMBEDDING_DIM as u64) as usize
}

/// Hashed bag-of-words vector, unit length unless the text has no tokens
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in tokenize(text) {
        vector[bucket(&token)] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Cosine similarity of two unit vectors
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, World! 42"), vec!["hello", "world", "42"]);
        assert!(tokenize("  ,.; ").is_empty());
    }

    #[test]
    fn test_identical_text_scores_one() {
        let a = embed("rust borrow checker");
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_overlap_beats_disjoint() {
        let query = embed("rust ownership");
        let related = embed("ownership rules in rust");
        let unrelated = embed("banana bread recipe");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_buckets_are_pinned() {
        // sha256("abc") starts ba7816bf8f01cfea, sha256("") starts e3b0c44298fc1c14
        assert_eq!(bucket("abc"), 0xea);
        assert_eq!(bucket(""), 0x14);

        let vector = embed("ABC");
        assert_eq!(vector[0xea], 1.0);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        assert!(embed("").iter().all(|v| *v == 0.0));
    }
}
