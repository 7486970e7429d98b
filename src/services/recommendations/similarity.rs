use ndarray::{Array1, Array2, ArrayView1, Axis};
use uuid::Uuid;

use super::encoder::FeatureMatrix;
use super::RecommendError;

/// Brute-force Euclidean nearest-neighbor index over a user's history.
///
/// Fitted fresh for every request and dropped with it.
#[derive(Debug)]
pub struct NeighborIndex {
    vocabulary_id: Uuid,
    points: Array2<f64>,
    k: usize,
}

impl NeighborIndex {
    /// Fits the index. `k` is capped at the number of history points.
    pub fn fit(history: &FeatureMatrix, k: usize) -> Result<Self, RecommendError> {
        if history.is_empty() {
            return Err(RecommendError::EmptyHistory);
        }

        Ok(Self {
            vocabulary_id: history.vocabulary_id,
            points: history.rows.clone(),
            k: k.clamp(1, history.len()),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Distances from `query` to its `k` nearest points, ascending
    pub fn kneighbors(&self, query: ArrayView1<f64>) -> Array1<f64> {
        let mut distances: Vec<f64> = self
            .points
            .rows()
            .into_iter()
            .map(|point| euclidean(point, query))
            .collect();
        distances.sort_by(|a, b| a.total_cmp(b));
        distances.truncate(self.k);
        Array1::from(distances)
    }

    /// Mean distance from each candidate row to its `k` nearest history points
    pub fn mean_distances(
        &self,
        candidates: &FeatureMatrix,
    ) -> Result<Array1<f64>, RecommendError> {
        if candidates.vocabulary_id != self.vocabulary_id {
            return Err(RecommendError::VocabularyMismatch {
                fitted: self.vocabulary_id,
                queried: candidates.vocabulary_id,
            });
        }

        // candidates x k
        let mut neighbors = Array2::<f64>::zeros((candidates.len(), self.k));
        for (mut row, candidate) in neighbors
            .rows_mut()
            .into_iter()
            .zip(candidates.rows.rows())
        {
            row.assign(&self.kneighbors(candidate));
        }

        Ok(neighbors
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(candidates.len())))
    }
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let diff = &a - &b;
    diff.dot(&diff).sqrt()
}

/// Turns mean distances into similarities in [0, 1].
///
/// The farthest candidate scores 0. When every distance is zero the
/// normalizer falls back to 1 so all candidates score 1.
pub fn similarity_scores(mean_distances: &Array1<f64>) -> Array1<f64> {
    let max = mean_distances.fold(0.0_f64, |acc, &d| acc.max(d));
    let max = if max > 0.0 { max } else { 1.0 };
    mean_distances.mapv(|d| (1.0 - d / max).clamp(0.0, 1.0))
}

/// Candidate positions ordered by descending score, ties in input order
pub fn rank(scores: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}
