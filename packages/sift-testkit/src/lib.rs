mod error;

pub use error::{Error, Result};

use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::Map;

use sift_config::Config;
use sift_domain::{EmbeddingCollection, EmbeddingVector, text};
use sift_service::{
	BoxFuture, DatasetStorage, EmbeddingProvider, ProviderError, Providers, SiftService,
};
use sift_storage::MemoryStore;

/// Embeds texts from a fixed table, falling back to a hashed bag of words for unknown texts.
pub struct StaticEmbedder {
	dimension: usize,
	table: HashMap<String, Vec<f32>>,
	calls: AtomicUsize,
}
impl StaticEmbedder {
	pub fn new(dimension: usize) -> Self {
		Self { dimension: dimension.max(1), table: HashMap::new(), calls: AtomicUsize::new(0) }
	}

	pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
		self.table.insert(text.into(), vector);

		self
	}

	/// Number of `embed` calls served so far.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector_for(&self, input: &str) -> Vec<f32> {
		if let Some(vector) = self.table.get(input) {
			return vector.clone();
		}

		let mut vector = vec![0.0; self.dimension];

		for token in text::tokenize(input) {
			let hash = blake3::hash(token.as_bytes());
			let bytes = hash.as_bytes();
			let bucket = u64::from_le_bytes([
				bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
			]) as usize % self.dimension;

			vector[bucket] += 1.0;
		}

		vector
	}
}
impl EmbeddingProvider for StaticEmbedder {
	fn embed<'a>(
		&'a self,
		_model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, std::result::Result<Vec<Vec<f32>>, ProviderError>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let vectors = texts.iter().map(|input| self.vector_for(input)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
	ModelNotFound,
	Unavailable,
}

/// Embedding provider that always fails with the configured failure.
pub struct FailingEmbedder {
	failure: Failure,
}
impl FailingEmbedder {
	pub fn new(failure: Failure) -> Self {
		Self { failure }
	}
}
impl EmbeddingProvider for FailingEmbedder {
	fn embed<'a>(
		&'a self,
		model: &'a str,
		_texts: &'a [String],
	) -> BoxFuture<'a, std::result::Result<Vec<Vec<f32>>, ProviderError>> {
		let err = match self.failure {
			Failure::ModelNotFound => ProviderError::ModelNotFound { model: model.to_string() },
			Failure::Unavailable =>
				ProviderError::Unavailable { message: "Embedding service is down.".to_string() },
		};

		Box::pin(async move { Err(err) })
	}
}

/// In-memory storage that counts how often datasets are loaded.
#[derive(Default)]
pub struct CountingStorage {
	inner: MemoryStore,
	loads: AtomicUsize,
}
impl CountingStorage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, collection: EmbeddingCollection) {
		self.inner.insert(collection);
	}

	pub fn loads(&self) -> usize {
		self.loads.load(Ordering::SeqCst)
	}
}
impl DatasetStorage for CountingStorage {
	fn load<'a>(
		&'a self,
		dataset_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<EmbeddingCollection, ProviderError>> {
		self.loads.fetch_add(1, Ordering::SeqCst);

		DatasetStorage::load(&self.inner, dataset_id)
	}
}

/// Default configuration with a short request timeout.
pub fn test_config() -> Config {
	let mut cfg = Config::default();

	cfg.service.request_timeout_ms = 5_000;

	cfg
}

/// Builds a collection from `(id, text, vector)` rows.
pub fn collection(
	dataset_id: &str,
	rows: &[(&str, &str, Vec<f32>)],
) -> Result<EmbeddingCollection> {
	let items = rows
		.iter()
		.map(|(id, text, vector)| EmbeddingVector::new(*id, *text, vector.clone(), Map::new()))
		.collect::<Vec<_>>();

	Ok(EmbeddingCollection::from_items(dataset_id, items)?)
}

/// A service wired to the given fakes.
pub fn service(
	cfg: Config,
	embedder: Arc<StaticEmbedder>,
	storage: Arc<CountingStorage>,
) -> Result<SiftService> {
	Ok(SiftService::new(cfg, Providers::new(embedder, storage))?)
}
