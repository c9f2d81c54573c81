pub mod model;
pub mod text;
pub mod time_serde;
pub mod vector;

mod error;

pub use error::{Error, Result};
pub use model::{
	EmbeddingCollection, EmbeddingVector, ScoreSignals, SearchResult, SearchResults, SearchType,
};
