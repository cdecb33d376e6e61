use std::collections::{HashMap, HashSet};

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use crate::error::Result;
use crate::recommenders::Recommender;
use crate::types::{ItemId, Rating, UserId};

pub const DEFAULT_EVAL_K: usize = 2000;
pub const DEFAULT_NUM_USERS: usize = 5000;

/// Ratings at or above this value count as "liked".
pub const LIKE_THRESHOLD: f32 = 4.0;

/// One liked item is held out and at least one more must remain.
const MIN_LIKED: usize = 2;

/// Fraction of the first `k` recommendations that are relevant.
///
/// The denominator is always the requested `k`, even when fewer than `k`
/// items were recommended.
pub fn precision_at_k(recommended: &[ItemId], relevant: &[ItemId], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let relevant: HashSet<ItemId> = relevant.iter().copied().collect();
    let hits = recommended
        .iter()
        .take(k)
        .filter(|item| relevant.contains(item))
        .count();
    hits as f64 / k as f64
}

/// Mean precision@k over a random sample of users, one held-out liked item each.
///
/// The held-out item is not removed from what `model` was fitted on, so the
/// score is optimistic for models that memorise. See
/// [`leave_one_out_precision_at_k`] for the refitting variant.
pub fn global_precision_at_k<M, R>(
    model: &M,
    ratings: &[Rating],
    k: usize,
    num_users: usize,
    rng: &mut R,
) -> Result<f64>
where
    M: Recommender + ?Sized,
    R: Rng + ?Sized,
{
    let liked = liked_items(ratings);
    let mut scores = Vec::new();

    for user_id in sample_users(ratings, num_users, rng) {
        let Some(held_out) = pick_held_out(&liked, user_id, rng) else {
            continue;
        };
        let recs = model.recommend(user_id, k)?;
        scores.push(precision_at_k(&recs, &[held_out], k));
    }

    Ok(summarize(model.name(), k, scores))
}

/// Like [`global_precision_at_k`], but every sampled user gets a freshly
/// fitted model that never saw the held-out item.
///
/// All rows for the (user, held-out item) pair are dropped before fitting.
/// Users left with no ratings after the removal are skipped.
pub fn leave_one_out_precision_at_k<M, F, R>(
    mut make_model: F,
    ratings: &[Rating],
    k: usize,
    num_users: usize,
    rng: &mut R,
) -> Result<f64>
where
    M: Recommender,
    F: FnMut() -> M,
    R: Rng + ?Sized,
{
    let liked = liked_items(ratings);
    let mut scores = Vec::new();
    let mut name = "";

    for user_id in sample_users(ratings, num_users, rng) {
        let Some(held_out) = pick_held_out(&liked, user_id, rng) else {
            continue;
        };
        let training: Vec<Rating> = ratings
            .iter()
            .filter(|r| !(r.user_id == user_id && r.item_id == held_out))
            .copied()
            .collect();
        if !training.iter().any(|r| r.user_id == user_id) {
            continue;
        }

        let mut model = make_model();
        model.fit(&training)?;
        name = model.name();
        let recs = model.recommend(user_id, k)?;
        scores.push(precision_at_k(&recs, &[held_out], k));
    }

    Ok(summarize(name, k, scores))
}

/// Distinct users in first-seen order, shuffled, then cut to `num_users`.
fn sample_users<R: Rng + ?Sized>(ratings: &[Rating], num_users: usize, rng: &mut R) -> Vec<UserId> {
    let mut seen = HashSet::new();
    let mut users: Vec<UserId> = ratings
        .iter()
        .map(|r| r.user_id)
        .filter(|id| seen.insert(*id))
        .collect();
    users.shuffle(rng);
    users.truncate(num_users);
    users
}

fn liked_items(ratings: &[Rating]) -> HashMap<UserId, Vec<ItemId>> {
    let mut liked: HashMap<UserId, Vec<ItemId>> = HashMap::new();
    for rating in ratings.iter().filter(|r| r.rating >= LIKE_THRESHOLD) {
        liked.entry(rating.user_id).or_default().push(rating.item_id);
    }
    liked
}

fn pick_held_out<R: Rng + ?Sized>(
    liked: &HashMap<UserId, Vec<ItemId>>,
    user_id: UserId,
    rng: &mut R,
) -> Option<ItemId> {
    let items = liked.get(&user_id).filter(|items| items.len() >= MIN_LIKED)?;
    items.choose(rng).copied()
}

fn summarize(model: &str, k: usize, scores: Vec<f64>) -> f64 {
    let mean = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    tracing::info!(model, k, evaluated_users = scores.len(), precision = mean, "evaluated precision@k");
    mean
}
