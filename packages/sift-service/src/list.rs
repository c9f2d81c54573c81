use serde::Serialize;

use crate::{Error, Result, SiftService};
use sift_domain::EmbeddingVector;

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingPage {
	pub dataset_id: String,
	pub total: usize,
	pub offset: usize,
	pub limit: usize,
	pub items: Vec<EmbeddingVector>,
}

impl SiftService {
	/// One page of a dataset's items in collection order. Vectors are omitted unless
	/// `include_vectors` is set.
	pub async fn list_embeddings(
		&self,
		dataset_id: &str,
		limit: usize,
		offset: usize,
		include_vectors: bool,
	) -> Result<EmbeddingPage> {
		let dataset_id = dataset_id.trim();

		if dataset_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "dataset_id must be non-empty.".to_string(),
			});
		}

		let max_limit = self.cfg.search.max_limit as usize;

		if limit == 0 || limit > max_limit {
			return Err(Error::InvalidRequest {
				message: format!("limit must be between 1 and {max_limit}."),
			});
		}

		let index = self.dataset_index(dataset_id).await?;
		let items = index
			.collection
			.items()
			.iter()
			.skip(offset)
			.take(limit)
			.map(|item| if include_vectors { item.clone() } else { item.without_vector() })
			.collect();

		Ok(EmbeddingPage {
			dataset_id: dataset_id.to_string(),
			total: index.collection.len(),
			offset,
			limit,
			items,
		})
	}
}
