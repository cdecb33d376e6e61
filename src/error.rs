use thiserror::Error;

use crate::types::UserId;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model has not been fitted, call fit() first")]
    UnfittedModel,

    #[error("unknown user_id: {0}")]
    UnknownUser(UserId),

    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, RecommendError>;
