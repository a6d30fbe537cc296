//! Vector math over document embeddings.

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Returns `0.0` when the lengths differ, either vector is empty, or either has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Running dimension-wise mean of fixed-length vectors
#[derive(Debug, Clone, PartialEq)]
pub struct MeanAccumulator {
    sum: Vec<f64>,
    count: usize,
}

impl MeanAccumulator {
    pub fn new(dimension: usize) -> Self {
        Self {
            sum: vec![0.0; dimension],
            count: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.sum.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Adds a vector, returns `false` (and ignores it) if its length doesn't match
    pub fn push(&mut self, vector: &[f64]) -> bool {
        if vector.len() != self.sum.len() {
            return false;
        }
        self.sum.iter_mut().zip(vector).for_each(|(acc, v)| *acc += v);
        self.count += 1;
        true
    }

    /// The mean of everything pushed so far, `None` if nothing was
    pub fn finish(self) -> Option<Vec<f64>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(self.sum.into_iter().map(|v| v / n).collect())
    }
}
