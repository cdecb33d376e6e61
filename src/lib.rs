//! Rating-based movie recommendations: a user-based neighborhood model, a
//! truncated-SVD factorization model, and a sampled precision@k evaluator.

pub mod datasets;
pub mod error;
pub mod knn_model;
pub mod metrics;
pub mod recommenders;
pub mod svd_model;
pub mod types;

pub use datasets::{read_ratings, read_titles, IndexMapping, InteractionMatrix};
pub use error::{RecommendError, Result};
pub use knn_model::NeighborhoodRecommender;
pub use metrics::{global_precision_at_k, leave_one_out_precision_at_k, precision_at_k};
pub use recommenders::{Recommender, DEFAULT_TOP_K};
pub use svd_model::FactorizationRecommender;
pub use types::{Candidate, ItemId, Rating, UserId};
