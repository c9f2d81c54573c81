use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{Error, Result, SiftService, ranking::KeywordIndex};
use sift_domain::{EmbeddingCollection, vector};

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
	/// Position of the item in its collection.
	pub position: usize,
	pub id: String,
	/// Cosine distance, `1 - cos`.
	pub distance: f32,
}

/// Exact nearest-neighbor search over a contiguous vector buffer.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
	dimension: Option<usize>,
	ids: Vec<String>,
	vectors: Vec<f32>,
}
impl FlatIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn dimension(&self) -> Option<usize> {
		self.dimension
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	/// Appends `vectors` with their `ids`. The first vector fixes the index dimension.
	pub fn add(&mut self, vectors: &[&[f32]], ids: &[String]) -> sift_domain::Result<()> {
		for (vector, id) in vectors.iter().zip(ids) {
			if vector.is_empty() {
				return Err(sift_domain::Error::EmptyVector { id: id.clone() });
			}

			let expected = *self.dimension.get_or_insert(vector.len());

			if vector.len() != expected {
				return Err(sift_domain::Error::DimensionMismatch {
					id: id.clone(),
					expected,
					actual: vector.len(),
				});
			}

			self.ids.push(id.clone());
			self.vectors.extend_from_slice(vector);
		}

		Ok(())
	}

	/// The `k` closest vectors to `query`, nearest first, ties broken by position. Vectors with
	/// zero norm have no defined distance and are skipped.
	pub fn search(&self, query: &[f32], k: usize) -> sift_domain::Result<Vec<Neighbor>> {
		let Some(dimension) = self.dimension else { return Ok(Vec::new()) };

		if query.len() != dimension {
			return Err(sift_domain::Error::DimensionMismatch {
				id: "query".to_string(),
				expected: dimension,
				actual: query.len(),
			});
		}

		let mut scored: Vec<(usize, f32)> = self
			.vectors
			.chunks_exact(dimension)
			.enumerate()
			.filter_map(|(position, item)| {
				vector::cosine_distance(query, item).map(|distance| (position, distance))
			})
			.collect();

		scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
		scored.truncate(k);

		Ok(scored
			.into_iter()
			.map(|(position, distance)| Neighbor {
				position,
				id: self.ids[position].clone(),
				distance,
			})
			.collect())
	}
}

/// A dataset with its vector and keyword indexes, immutable once built.
#[derive(Debug)]
pub struct DatasetIndex {
	pub collection: EmbeddingCollection,
	pub vectors: FlatIndex,
	pub keywords: KeywordIndex,
}
impl DatasetIndex {
	pub fn build(collection: EmbeddingCollection) -> sift_domain::Result<Self> {
		let items = collection.items();
		let vectors: Vec<&[f32]> = items.iter().map(|item| item.vector.as_slice()).collect();
		let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
		let mut flat = FlatIndex::new();

		flat.add(&vectors, &ids)?;

		let keywords = KeywordIndex::build(items.iter().map(|item| item.text.as_str()));

		Ok(Self { collection, vectors: flat, keywords })
	}
}

/// Lazily built per-dataset indexes. The first index registered for a dataset wins.
#[derive(Default)]
pub(crate) struct IndexRegistry {
	indexes: RwLock<HashMap<String, Arc<DatasetIndex>>>,
}
impl IndexRegistry {
	pub(crate) fn get(&self, dataset_id: &str) -> Option<Arc<DatasetIndex>> {
		self.indexes.read().get(dataset_id).cloned()
	}

	pub(crate) fn insert(&self, dataset_id: &str, index: Arc<DatasetIndex>) -> Arc<DatasetIndex> {
		self.indexes.write().entry(dataset_id.to_string()).or_insert(index).clone()
	}

	pub(crate) fn remove(&self, dataset_id: &str) -> bool {
		self.indexes.write().remove(dataset_id).is_some()
	}

	pub(crate) fn dataset_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.indexes.read().keys().cloned().collect();

		ids.sort();

		ids
	}
}

impl SiftService {
	/// Returns the index of `dataset_id`, loading and building it on first use.
	pub(crate) async fn dataset_index(&self, dataset_id: &str) -> Result<Arc<DatasetIndex>> {
		if let Some(index) = self.indexes.get(dataset_id) {
			return Ok(index);
		}

		let loaded =
			tokio::time::timeout(self.request_timeout(), self.providers.storage.load(dataset_id))
				.await
				.map_err(|_| Error::IndexUnavailable {
					message: format!("Loading dataset {dataset_id:?} timed out."),
				})?;
		let collection = loaded.map_err(crate::storage_load_error)?;

		if collection.dataset_id() != dataset_id {
			tracing::warn!(
				dataset_id,
				loaded_dataset_id = collection.dataset_id(),
				"Storage returned a collection under a different dataset id."
			);
		}

		let index = DatasetIndex::build(collection)
			.map_err(|err| Error::IndexUnavailable { message: err.to_string() })?;

		tracing::info!(
			dataset_id,
			items = index.collection.len(),
			dimension = index.vectors.dimension().unwrap_or(0),
			"Dataset index built."
		);

		Ok(self.indexes.insert(dataset_id, Arc::new(index)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn add_rows(index: &mut FlatIndex, rows: &[(&str, Vec<f32>)]) -> sift_domain::Result<()> {
		let vectors: Vec<&[f32]> = rows.iter().map(|(_, vector)| vector.as_slice()).collect();
		let ids: Vec<String> = rows.iter().map(|(id, _)| id.to_string()).collect();

		index.add(&vectors, &ids)
	}

	#[test]
	fn search_returns_nearest_first() {
		let mut index = FlatIndex::new();

		add_rows(
			&mut index,
			&[("x", vec![1.0, 0.0]), ("y", vec![0.0, 1.0]), ("xy", vec![0.7, 0.7])],
		)
		.expect("add");

		let neighbors = index.search(&[1.0, 0.1], 2).expect("search");

		assert_eq!(neighbors.len(), 2);
		assert_eq!(neighbors[0].id, "x");
		assert_eq!(neighbors[1].id, "xy");
		assert!(neighbors[0].distance < neighbors[1].distance);
	}

	#[test]
	fn mismatched_dimensions_are_rejected() {
		let mut index = FlatIndex::new();

		add_rows(&mut index, &[("x", vec![1.0, 0.0])]).expect("add");

		assert!(add_rows(&mut index, &[("z", vec![1.0, 0.0, 0.0])]).is_err());
		assert!(index.search(&[1.0], 1).is_err());
		assert_eq!(index.len(), 1);
	}

	#[test]
	fn empty_vectors_are_rejected() {
		let mut index = FlatIndex::new();
		let err = add_rows(&mut index, &[("e", Vec::new())]).expect_err("empty vector");

		assert!(matches!(err, sift_domain::Error::EmptyVector { .. }));
		assert_eq!(index.dimension(), None);
		assert!(index.search(&[], 3).expect("no dimension yet").is_empty());
	}

	#[test]
	fn zero_vectors_are_skipped() {
		let mut index = FlatIndex::new();

		add_rows(&mut index, &[("zero", vec![0.0, 0.0]), ("y", vec![0.0, 1.0])]).expect("add");

		let neighbors = index.search(&[0.0, 1.0], 5).expect("search");

		assert_eq!(neighbors.len(), 1);
		assert_eq!(neighbors[0].id, "y");
		assert!(FlatIndex::new().search(&[1.0], 3).expect("empty").is_empty());
	}
}
