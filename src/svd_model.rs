use std::cmp::Ordering;

use candle_core::{Device, Tensor};
use nalgebra::{DMatrix, SVD};

use crate::datasets::InteractionMatrix;
use crate::error::{RecommendError, Result};
use crate::recommenders::{rank_unseen, Recommender};
use crate::types::{Candidate, Rating, UserId};

pub const DEFAULT_N_COMPONENTS: usize = 20;

struct FactorizationState {
    matrix: InteractionMatrix,
    /// (n_users, k), left singular vectors scaled by the singular values
    user_factors: Tensor,
    /// (k, n_items)
    item_factors: Tensor,
}

/// Matrix factorization recommender built on a truncated SVD of the interaction matrix.
pub struct FactorizationRecommender {
    n_components: usize,
    device: Device,
    state: Option<FactorizationState>,
}

impl FactorizationRecommender {
    pub fn new(n_components: usize) -> Self {
        Self::with_device(n_components, Device::Cpu)
    }

    pub fn with_device(n_components: usize, device: Device) -> Self {
        Self {
            n_components,
            device,
            state: None,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Effective rank after fitting: `min(n_components, min(n_users, n_items))`.
    pub fn rank(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.item_factors.dims()[0])
    }

    pub fn user_factors(&self) -> Option<&Tensor> {
        self.state.as_ref().map(|s| &s.user_factors)
    }

    pub fn item_factors(&self) -> Option<&Tensor> {
        self.state.as_ref().map(|s| &s.item_factors)
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn factorize(&self, matrix: &InteractionMatrix) -> Result<(Tensor, Tensor)> {
        let (n_users, n_items) = (matrix.n_users(), matrix.n_items());
        let flat: Vec<f64> = matrix.values().flatten_all()?.to_vec1::<f64>()?;
        let dense = DMatrix::from_row_slice(n_users, n_items, &flat);

        let svd = SVD::try_new(dense, true, true, f64::EPSILON, 0)
            .ok_or_else(|| RecommendError::Decomposition("SVD did not converge".to_string()))?;
        let u = svd
            .u
            .ok_or_else(|| RecommendError::Decomposition("U was not computed".to_string()))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| RecommendError::Decomposition("V^T was not computed".to_string()))?;
        let sigma = svd.singular_values;

        let mut order: Vec<usize> = (0..sigma.len()).collect();
        order.sort_by(|&a, &b| sigma[b].partial_cmp(&sigma[a]).unwrap_or(Ordering::Equal));
        let k = self.n_components.min(sigma.len());
        let kept = &order[..k];

        let mut user_data = Vec::with_capacity(n_users * k);
        for row in 0..n_users {
            user_data.extend(kept.iter().map(|&c| u[(row, c)] * sigma[c]));
        }
        let mut item_data = Vec::with_capacity(k * n_items);
        for &c in kept {
            item_data.extend((0..n_items).map(|col| v_t[(c, col)]));
        }

        let user_factors = Tensor::from_vec(user_data, (n_users, k), &self.device)?;
        let item_factors = Tensor::from_vec(item_data, (k, n_items), &self.device)?;
        Ok((user_factors, item_factors))
    }
}

impl Default for FactorizationRecommender {
    fn default() -> Self {
        Self::new(DEFAULT_N_COMPONENTS)
    }
}

impl Recommender for FactorizationRecommender {
    fn name(&self) -> &'static str {
        "svd"
    }

    fn fit(&mut self, ratings: &[Rating]) -> Result<()> {
        if self.n_components == 0 {
            return Err(RecommendError::InvalidInput(
                "n_components must be at least 1".to_string(),
            ));
        }
        let matrix = InteractionMatrix::build(ratings, &self.device)?;
        let (user_factors, item_factors) = self.factorize(&matrix)?;

        let reconstructed = user_factors.matmul(&item_factors)?;
        let rmse = candle_nn::loss::mse(&reconstructed, matrix.values())?
            .to_scalar::<f64>()?
            .sqrt();
        tracing::debug!(rmse, "truncated factorization reconstruction error");
        tracing::info!(
            n_users = matrix.n_users(),
            n_items = matrix.n_items(),
            rank = item_factors.dims()[0],
            "fitted factorization recommender"
        );

        self.state = Some(FactorizationState {
            matrix,
            user_factors,
            item_factors,
        });
        Ok(())
    }

    fn recommend_scored(&self, user_id: UserId, top_k: usize) -> Result<Vec<Candidate>> {
        let state = self.state.as_ref().ok_or(RecommendError::UnfittedModel)?;
        let user_idx = state.matrix.user_index(user_id)?;

        let user_vec = state.user_factors.get(user_idx)?.unsqueeze(0)?;
        let scores = user_vec
            .matmul(&state.item_factors)?
            .squeeze(0)?
            .to_vec1::<f64>()?;

        rank_unseen(&state.matrix, user_idx, scores, top_k)
    }
}
