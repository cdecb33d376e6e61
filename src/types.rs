use serde::Serialize;

pub type UserId = u32;
pub type ItemId = u32;

/// One row of the rating table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f32,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

impl From<(UserId, ItemId, f32)> for Rating {
    fn from((user_id, item_id, rating): (UserId, ItemId, f32)) -> Self {
        Self::new(user_id, item_id, rating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub item_id: ItemId,
    pub score: f64,
}
