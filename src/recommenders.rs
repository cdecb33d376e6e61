use std::cmp::Ordering;

use crate::datasets::InteractionMatrix;
use crate::error::Result;
use crate::types::{Candidate, ItemId, Rating, UserId};

/// Number of items returned by `recommend` when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 5;

pub trait Recommender {
    fn name(&self) -> &'static str;

    /// Trains on the rating table, replacing any previously fitted state.
    fn fit(&mut self, ratings: &[Rating]) -> Result<()>;

    /// Top `top_k` unseen items for `user_id`, best first, with their scores.
    fn recommend_scored(&self, user_id: UserId, top_k: usize) -> Result<Vec<Candidate>>;

    fn recommend(&self, user_id: UserId, top_k: usize) -> Result<Vec<ItemId>> {
        Ok(self
            .recommend_scored(user_id, top_k)?
            .into_iter()
            .map(|c| c.item_id)
            .collect())
    }
}

impl<T: Recommender + ?Sized> Recommender for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fit(&mut self, ratings: &[Rating]) -> Result<()> {
        (**self).fit(ratings)
    }

    fn recommend_scored(&self, user_id: UserId, top_k: usize) -> Result<Vec<Candidate>> {
        (**self).recommend_scored(user_id, top_k)
    }
}

/// Keeps the `top_k` best columns the user has not rated yet.
///
/// Rated columns behave as if scored `-inf` and are never returned, which
/// makes the result shorter than `top_k` when the user has rated almost
/// everything. Ties keep column order, so the lower column index ranks first.
pub(crate) fn rank_unseen(
    matrix: &InteractionMatrix,
    user_idx: usize,
    scores: Vec<f64>,
    top_k: usize,
) -> Result<Vec<Candidate>> {
    let seen = matrix.seen_mask(user_idx)?;
    let mut ranked: Vec<(usize, f64)> = scores
        .into_iter()
        .enumerate()
        .filter(|&(idx, _)| !seen[idx])
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_k);

    Ok(ranked
        .into_iter()
        .filter_map(|(idx, score)| {
            matrix
                .items()
                .decode(idx)
                .map(|item_id| Candidate { item_id, score })
        })
        .collect())
}
