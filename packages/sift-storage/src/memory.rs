use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{Error, Result};
use sift_domain::EmbeddingCollection;

#[derive(Debug, Default)]
pub struct MemoryStore {
	datasets: RwLock<HashMap<String, Arc<EmbeddingCollection>>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a collection under its dataset id, replacing any previous version.
	pub fn insert(&self, collection: EmbeddingCollection) -> Option<Arc<EmbeddingCollection>> {
		let dataset_id = collection.dataset_id().to_string();

		self.datasets.write().insert(dataset_id, Arc::new(collection))
	}

	pub fn remove(&self, dataset_id: &str) -> Option<Arc<EmbeddingCollection>> {
		self.datasets.write().remove(dataset_id)
	}

	pub fn get(&self, dataset_id: &str) -> Result<Arc<EmbeddingCollection>> {
		self.datasets
			.read()
			.get(dataset_id)
			.cloned()
			.ok_or_else(|| Error::NotFound(dataset_id.to_string()))
	}

	pub fn dataset_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.datasets.read().keys().cloned().collect();

		ids.sort();

		ids
	}
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;
	use sift_domain::EmbeddingVector;

	#[test]
	fn insert_replaces_previous_version() {
		let store = MemoryStore::new();
		let first = EmbeddingCollection::from_items("ds", [EmbeddingVector::new(
			"a",
			"alpha",
			vec![1.0, 0.0],
			Map::new(),
		)])
		.expect("collection must build");

		assert!(store.insert(first).is_none());
		assert!(store.insert(EmbeddingCollection::new("ds")).is_some());
		assert!(store.get("ds").expect("dataset must exist").is_empty());
		assert!(matches!(store.get("missing"), Err(Error::NotFound(_))));
		assert_eq!(store.dataset_ids(), vec!["ds".to_string()]);
	}
}
