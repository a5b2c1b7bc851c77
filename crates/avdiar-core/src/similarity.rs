//! Cosine similarity between embedding vectors

use thiserror::Error;

/// Errors for undefined similarity inputs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("embedding length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("cosine similarity is undefined for a zero-norm embedding")]
    ZeroNorm,
}

/// Calculate cosine similarity between two equal-length vectors.
///
/// Returns a value from -1 to 1, where 1 = identical. Accumulates in f64
/// to avoid precision loss on long embeddings. Zero-norm input is an error,
/// not a silent 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot_product: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for i in 0..a.len() {
        let a_val = a[i] as f64;
        let b_val = b[i] as f64;
        dot_product += a_val * b_val;
        norm_a += a_val * a_val;
        norm_b += b_val * b_val;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::ZeroNorm);
    }

    Ok((dot_product / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 0.001);
    }

    #[test]
    fn test_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_norm_is_error() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), Err(SimilarityError::ZeroNorm));
        assert_eq!(cosine_similarity(&b, &a), Err(SimilarityError::ZeroNorm));
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(
            cosine_similarity(&a, &b),
            Err(SimilarityError::LengthMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_empty_vectors_are_zero_norm() {
        let a: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &a), Err(SimilarityError::ZeroNorm));
    }
}
