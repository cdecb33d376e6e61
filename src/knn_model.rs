use candle_core::{Device, Tensor};

use crate::datasets::InteractionMatrix;
use crate::error::{RecommendError, Result};
use crate::recommenders::{rank_unseen, Recommender};
use crate::types::{Candidate, Rating, UserId};

/// Row-wise cosine similarity of a 2-D tensor.
///
/// Rows with zero norm get similarity 0 against every row, themselves included.
pub fn cosine_similarity(values: &Tensor) -> candle_core::Result<Tensor> {
    let norms = values.sqr()?.sum(1)?.sqrt()?.to_vec1::<f64>()?;
    let inv_norms: Vec<f64> = norms
        .iter()
        .map(|&n| if n > 0.0 { 1.0 / n } else { 0.0 })
        .collect();
    let inv_norms = Tensor::from_vec(inv_norms, (norms.len(), 1), values.device())?;

    let normalized = values.broadcast_mul(&inv_norms)?;
    normalized.matmul(&normalized.t()?.contiguous()?)
}

struct NeighborhoodState {
    matrix: InteractionMatrix,
    similarity: Tensor,
}

/// User-based collaborative filtering over cosine similarity between users.
pub struct NeighborhoodRecommender {
    device: Device,
    state: Option<NeighborhoodState>,
}

impl NeighborhoodRecommender {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            state: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// The users x users similarity matrix, once fitted.
    pub fn similarity(&self) -> Option<&Tensor> {
        self.state.as_ref().map(|s| &s.similarity)
    }

    pub fn interaction_matrix(&self) -> Option<&InteractionMatrix> {
        self.state.as_ref().map(|s| &s.matrix)
    }
}

impl Default for NeighborhoodRecommender {
    fn default() -> Self {
        Self::new(Device::Cpu)
    }
}

impl Recommender for NeighborhoodRecommender {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn fit(&mut self, ratings: &[Rating]) -> Result<()> {
        let matrix = InteractionMatrix::build(ratings, &self.device)?;
        let similarity = cosine_similarity(matrix.values())?;
        tracing::info!(
            n_users = matrix.n_users(),
            n_items = matrix.n_items(),
            "fitted neighborhood recommender"
        );
        self.state = Some(NeighborhoodState { matrix, similarity });
        Ok(())
    }

    fn recommend_scored(&self, user_id: UserId, top_k: usize) -> Result<Vec<Candidate>> {
        let state = self.state.as_ref().ok_or(RecommendError::UnfittedModel)?;
        let user_idx = state.matrix.user_index(user_id)?;

        // (1, n_users) x (n_users, n_items): the user's own row carries weight 1.0
        let weights = state.similarity.get(user_idx)?.unsqueeze(0)?;
        let scores = weights
            .matmul(state.matrix.values())?
            .squeeze(0)?
            .to_vec1::<f64>()?;

        rank_unseen(&state.matrix, user_idx, scores, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemId;

    fn scenario() -> Vec<Rating> {
        [(1, 10, 5.0), (1, 20, 3.0), (2, 10, 4.0), (2, 30, 5.0), (3, 20, 5.0), (3, 30, 2.0)]
            .into_iter()
            .map(Rating::from)
            .collect()
    }

    fn wider() -> Vec<Rating> {
        let mut ratings = Vec::new();
        for user in 1..=6u32 {
            for item in 1..=8u32 {
                if (user + item) % 3 != 0 {
                    let rating = ((user * item) % 5 + 1) as f32;
                    ratings.push(Rating::new(user, item * 100, rating));
                }
            }
        }
        ratings
    }

    #[test]
    fn test_recommend_excludes_seen_items() -> Result<()> {
        let mut model = NeighborhoodRecommender::default();
        model.fit(&scenario())?;
        assert_eq!(model.recommend(1, 2)?, vec![30]);
        Ok(())
    }

    #[test]
    fn test_similarity_is_symmetric_with_unit_diagonal() -> Result<()> {
        let mut model = NeighborhoodRecommender::default();
        model.fit(&wider())?;
        let sim = model.similarity().unwrap().to_vec2::<f64>()?;
        for i in 0..sim.len() {
            assert!((sim[i][i] - 1.0).abs() < 1e-9, "diagonal {} is {}", i, sim[i][i]);
            for j in 0..sim.len() {
                assert!((sim[i][j] - sim[j][i]).abs() < 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_scenario_similarity_values() -> Result<()> {
        let mut model = NeighborhoodRecommender::default();
        model.fit(&scenario())?;
        let sim = model.similarity().unwrap().to_vec2::<f64>()?;
        // users 1 and 2 share only item 10: 5*4 / (sqrt(34) * sqrt(41))
        let expected = 20.0 / (34f64.sqrt() * 41f64.sqrt());
        assert!((sim[0][1] - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_zero_norm_row_has_zero_similarity() -> Result<()> {
        let ratings = vec![
            Rating::new(1, 10, 0.0),
            Rating::new(2, 10, 3.0),
            Rating::new(2, 20, 4.0),
        ];
        let mut model = NeighborhoodRecommender::default();
        model.fit(&ratings)?;
        let sim = model.similarity().unwrap().to_vec2::<f64>()?;
        assert_eq!(sim[0], vec![0.0, 0.0]);
        assert!(sim.iter().flatten().all(|v| v.is_finite()));

        // user 1's 0.0 rating does not count as seen
        let recs = model.recommend(1, 5)?;
        assert_eq!(recs, vec![10, 20]);
        Ok(())
    }

    #[test]
    fn test_recommend_length_and_seen_masking() -> Result<()> {
        let ratings = wider();
        let mut model = NeighborhoodRecommender::default();
        model.fit(&ratings)?;
        let matrix = model.interaction_matrix().unwrap();
        for user in 1..=6u32 {
            let seen: Vec<ItemId> = ratings
                .iter()
                .filter(|r| r.user_id == user)
                .map(|r| r.item_id)
                .collect();
            let unseen = matrix.n_items() - seen.len();

            let recs = model.recommend(user, 2)?;
            assert_eq!(recs.len(), 2.min(unseen));
            let recs = model.recommend(user, 100)?;
            assert_eq!(recs.len(), unseen);
            assert!(recs.iter().all(|item| !seen.contains(item)));
        }
        Ok(())
    }

    #[test]
    fn test_scores_are_descending() -> Result<()> {
        let mut model = NeighborhoodRecommender::default();
        model.fit(&wider())?;
        let recs = model.recommend_scored(4, 10)?;
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
        Ok(())
    }

    #[test]
    fn test_recommend_before_fit() {
        let model = NeighborhoodRecommender::default();
        assert!(matches!(model.recommend(1, 5), Err(RecommendError::UnfittedModel)));
    }

    #[test]
    fn test_recommend_unknown_user() -> Result<()> {
        let mut model = NeighborhoodRecommender::default();
        model.fit(&scenario())?;
        assert!(matches!(model.recommend(99, 5), Err(RecommendError::UnknownUser(99))));
        Ok(())
    }

    #[test]
    fn test_fit_is_deterministic_and_refit_replaces_state() -> Result<()> {
        let mut a = NeighborhoodRecommender::default();
        let mut b = NeighborhoodRecommender::default();
        a.fit(&wider())?;
        b.fit(&wider())?;
        for user in 1..=6u32 {
            assert_eq!(a.recommend(user, 3)?, b.recommend(user, 3)?);
        }

        a.fit(&scenario())?;
        assert!(matches!(a.recommend(6, 3), Err(RecommendError::UnknownUser(6))));
        assert_eq!(a.recommend(1, 2)?, vec![30]);
        Ok(())
    }

    #[test]
    fn test_fit_empty_table() {
        let mut model = NeighborhoodRecommender::default();
        assert!(matches!(model.fit(&[]), Err(RecommendError::InvalidInput(_))));
        assert!(!model.is_fitted());
    }
}
