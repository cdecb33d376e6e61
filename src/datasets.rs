use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::Context;
use candle_core::{Device, Tensor};
use serde::Deserialize;

use crate::error::{RecommendError, Result};
use crate::types::{ItemId, Rating, UserId};

/// Bidirectional mapping between external ids and matrix positions.
///
/// Ids are enumerated in ascending order, so position `0` is always the smallest id.
#[derive(Debug, Clone, Default)]
pub struct IndexMapping {
    map: HashMap<u32, usize>,
    reverse_map: Vec<u32>,
}

impl IndexMapping {
    pub fn new(ids: impl Iterator<Item = u32>) -> Self {
        let reverse_map: Vec<u32> = ids.collect::<BTreeSet<_>>().into_iter().collect();
        let map = reverse_map
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();
        Self { map, reverse_map }
    }

    pub fn encode(&self, id: u32) -> Option<usize> {
        self.map.get(&id).copied()
    }

    pub fn decode(&self, idx: usize) -> Option<u32> {
        self.reverse_map.get(idx).copied()
    }

    pub fn ids(&self) -> &[u32] {
        &self.reverse_map
    }

    pub fn len(&self) -> usize {
        self.reverse_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse_map.is_empty()
    }
}

/// Dense users x items rating matrix. Unrated cells hold `0.0`.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    values: Tensor,
    users: IndexMapping,
    items: IndexMapping,
}

impl InteractionMatrix {
    /// Pivots the rating table into a dense `f64` tensor on `device`.
    ///
    /// When a (user, item) pair occurs more than once the later row wins.
    pub fn build(ratings: &[Rating], device: &Device) -> Result<Self> {
        if ratings.is_empty() {
            return Err(RecommendError::InvalidInput(
                "rating table is empty".to_string(),
            ));
        }
        if let Some(bad) = ratings.iter().find(|r| !r.rating.is_finite()) {
            return Err(RecommendError::InvalidInput(format!(
                "non-finite rating {} for user {} item {}",
                bad.rating, bad.user_id, bad.item_id
            )));
        }

        let users = IndexMapping::new(ratings.iter().map(|r| r.user_id));
        let items = IndexMapping::new(ratings.iter().map(|r| r.item_id));
        let (n_users, n_items) = (users.len(), items.len());

        let mut cells = vec![0f64; n_users * n_items];
        for rating in ratings {
            if let (Some(u), Some(i)) = (users.encode(rating.user_id), items.encode(rating.item_id)) {
                cells[u * n_items + i] = rating.rating as f64;
            }
        }

        let values = Tensor::from_vec(cells, (n_users, n_items), device)?;
        tracing::debug!(n_users, n_items, n_ratings = ratings.len(), "built interaction matrix");
        Ok(Self {
            values,
            users,
            items,
        })
    }

    pub fn values(&self) -> &Tensor {
        &self.values
    }

    pub fn users(&self) -> &IndexMapping {
        &self.users
    }

    pub fn items(&self) -> &IndexMapping {
        &self.items
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    pub fn user_index(&self, user_id: UserId) -> Result<usize> {
        self.users
            .encode(user_id)
            .ok_or(RecommendError::UnknownUser(user_id))
    }

    pub fn row(&self, user_idx: usize) -> Result<Vec<f64>> {
        Ok(self.values.get(user_idx)?.to_vec1::<f64>()?)
    }

    /// Items the user has already rated. A stored rating of `0.0` counts as unrated.
    pub fn seen_mask(&self, user_idx: usize) -> Result<Vec<bool>> {
        Ok(self.row(user_idx)?.into_iter().map(|v| v > 0.0).collect())
    }
}

#[derive(Debug, Deserialize)]
struct RatingRecord {
    user_id: UserId,
    item_id: ItemId,
    rating: f32,
    #[allow(dead_code)]
    timestamp: u64,
}

/// Reads a MovieLens 100k `u.data` file (tab separated, no header).
pub fn read_ratings(path: impl AsRef<Path>) -> anyhow::Result<Vec<Rating>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open ratings file {}", path.display()))?;

    let mut ratings = Vec::new();
    for (line, record) in reader.deserialize::<RatingRecord>().enumerate() {
        let record =
            record.with_context(|| format!("failed to parse {} line {}", path.display(), line + 1))?;
        ratings.push(Rating::new(record.user_id, record.item_id, record.rating));
    }
    tracing::info!(path = %path.display(), n_ratings = ratings.len(), "loaded ratings");
    Ok(ratings)
}

/// Reads a MovieLens 100k `u.item` file into an item id -> title lookup.
///
/// The file is pipe separated and Latin-1 encoded.
pub fn read_titles(path: impl AsRef<Path>) -> anyhow::Result<HashMap<ItemId, String>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .with_context(|| format!("failed to open movies file {}", path.display()))?;

    let mut titles = HashMap::new();
    for (line, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("failed to read {} line {}", path.display(), line + 1))?;
        let (Some(id), Some(title)) = (record.get(0), record.get(1)) else {
            anyhow::bail!("{} line {}: expected at least two fields", path.display(), line + 1);
        };
        let item_id: ItemId = std::str::from_utf8(id)?
            .trim()
            .parse()
            .with_context(|| format!("{} line {}: bad movie id", path.display(), line + 1))?;
        titles.insert(item_id, decode_latin1(title));
    }
    Ok(titles)
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
