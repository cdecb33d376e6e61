use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use movie_rec::metrics::{DEFAULT_EVAL_K, DEFAULT_NUM_USERS};
use movie_rec::svd_model::DEFAULT_N_COMPONENTS;
use movie_rec::{
    global_precision_at_k, leave_one_out_precision_at_k, read_ratings, read_titles,
    FactorizationRecommender, ItemId, NeighborhoodRecommender, Recommender, UserId, DEFAULT_TOP_K,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelKind {
    /// User-based cosine similarity
    Knn,
    /// Truncated SVD
    Svd,
}

#[derive(Parser, Debug)]
#[command(name = "movie-rec")]
#[command(about = "Fit a movie recommender on MovieLens ratings and score it with precision@k")]
struct Args {
    /// MovieLens 100k ratings file (u.data)
    #[arg(long, default_value = "data/ml-100k/u.data")]
    ratings_path: PathBuf,

    /// MovieLens 100k movies file (u.item), used for titles
    #[arg(long)]
    movies_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModelKind::Svd)]
    model: ModelKind,

    /// Latent factors kept by the SVD model
    #[arg(long, default_value_t = DEFAULT_N_COMPONENTS)]
    n_components: usize,

    /// Print recommendations for this user
    #[arg(long)]
    user_id: Option<UserId>,

    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Cutoff used by the evaluation
    #[arg(long, default_value_t = DEFAULT_EVAL_K)]
    eval_k: usize,

    /// Number of users sampled by the evaluation
    #[arg(long, default_value_t = DEFAULT_NUM_USERS)]
    num_users: usize,

    /// Seed for user sampling; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Refit without the held-out item for every evaluated user
    #[arg(long)]
    leave_one_out: bool,

    #[arg(long)]
    skip_eval: bool,

    /// Print recommendations as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RecommendationResult {
    item_id: ItemId,
    title: String,
    score: f64,
}

fn build_model(kind: ModelKind, n_components: usize) -> Box<dyn Recommender> {
    match kind {
        ModelKind::Knn => Box::new(NeighborhoodRecommender::default()),
        ModelKind::Svd => Box::new(FactorizationRecommender::new(n_components)),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let ratings = read_ratings(&args.ratings_path)?;
    let titles: HashMap<ItemId, String> = match &args.movies_path {
        Some(path) => read_titles(path)?,
        None => HashMap::new(),
    };

    let mut model = build_model(args.model, args.n_components);
    model.fit(&ratings)?;

    if let Some(user_id) = args.user_id {
        let results: Vec<RecommendationResult> = model
            .recommend_scored(user_id, args.top_k)?
            .into_iter()
            .map(|c| RecommendationResult {
                item_id: c.item_id,
                title: titles
                    .get(&c.item_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                score: c.score,
            })
            .collect();

        if args.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            println!("Top {} for user {}:", args.top_k, user_id);
            for (rank, r) in results.iter().enumerate() {
                println!("{:>3}. [{}] {} | score {:.4}", rank + 1, r.item_id, r.title, r.score);
            }
        }
    }

    if args.skip_eval {
        return Ok(());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let precision = if args.leave_one_out {
        leave_one_out_precision_at_k(
            || build_model(args.model, args.n_components),
            &ratings,
            args.eval_k,
            args.num_users,
            &mut rng,
        )?
    } else {
        global_precision_at_k(&model, &ratings, args.eval_k, args.num_users, &mut rng)?
    };
    println!("{} Precision@{}: {:.4}", model.name(), args.eval_k, precision);
    Ok(())
}
