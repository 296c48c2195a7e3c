//! Vector math shared by the ranking code

/// Dot product of two equal-length vectors. Returns 0.0 on length mismatch.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in [-1, 1]. Zero vectors and mismatched lengths yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product(a, b) / (norm_a * norm_b)
}

/// Cosine distance `1 - cosine(a, b)`, in [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Similarity derived from a cosine distance: `max(0, 1 - distance)`.
///
/// Never negative; a NaN distance maps to 0.0.
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);

        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);

        let c = vec![-1.0, 0.0, 0.0];
        assert!((cosine_distance(&a, &c) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(dot_product(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_similarity_from_distance_never_negative() {
        for distance in [0.0f32, 0.25, 1.0, 1.5, 2.0, f32::NAN] {
            let similarity = similarity_from_distance(distance);
            assert!(similarity >= 0.0, "distance {} gave {}", distance, similarity);
        }
        assert!((similarity_from_distance(0.25) - 0.75).abs() < 1e-6);
    }
}
