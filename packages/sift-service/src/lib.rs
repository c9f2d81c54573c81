pub mod admin;
pub mod cache;
pub mod index;
pub mod list;
pub mod monitor;
pub mod ranking;
pub mod search;

mod error;

pub use admin::{HealthReport, HealthStatus};
pub use cache::{CacheScope, CacheStats, IntelligentCache};
pub use error::{Error, ErrorStatus, Result};
pub use index::{DatasetIndex, FlatIndex, Neighbor};
pub use list::EmbeddingPage;
pub use monitor::{PerformanceMetrics, QualityTrends, SearchQualityReport};
pub use search::{SearchOptions, SearchRequest};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use parking_lot::RwLock;

use crate::{
	index::IndexRegistry,
	monitor::SearchMonitor,
	ranking::{AdvancedRelevanceStrategy, BalancedScoringStrategy},
};
use sift_config::{
	Config, DatasetStorageConfig, DiversificationConfig, EmbeddingProviderConfig, ScoringWeights,
};
use sift_domain::EmbeddingCollection;
use sift_storage::{JsonDirStore, MemoryStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure reported by an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
	#[error("Embedding model {model:?} is not available.")]
	ModelNotFound { model: String },
	#[error("Dataset {dataset_id:?} does not exist.")]
	DatasetNotFound { dataset_id: String },
	#[error("{message}")]
	InvalidRequest { message: String },
	#[error("{message}")]
	Generation { message: String },
	#[error("{message}")]
	Unavailable { message: String },
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, std::result::Result<Vec<Vec<f32>>, ProviderError>>;
}

pub trait DatasetStorage
where
	Self: Send + Sync,
{
	fn load<'a>(
		&'a self,
		dataset_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<EmbeddingCollection, ProviderError>>;
}

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbeddingProvider {
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbeddingProvider {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}
impl EmbeddingProvider for HttpEmbeddingProvider {
	fn embed<'a>(
		&'a self,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, std::result::Result<Vec<Vec<f32>>, ProviderError>> {
		Box::pin(async move {
			let embedded = sift_providers::embedding::embed(&self.cfg, model, texts).await;

			embedded.map_err(|err| match err {
				sift_providers::Error::ModelNotFound { model } =>
					ProviderError::ModelNotFound { model },
				err if err.is_unavailable() =>
					ProviderError::Unavailable { message: err.to_string() },
				err => ProviderError::Generation { message: err.to_string() },
			})
		})
	}
}

/// Dataset storage backed by the remote storage service.
pub struct HttpDatasetStorage {
	cfg: DatasetStorageConfig,
}
impl HttpDatasetStorage {
	pub fn new(cfg: DatasetStorageConfig) -> Self {
		Self { cfg }
	}
}
impl DatasetStorage for HttpDatasetStorage {
	fn load<'a>(
		&'a self,
		dataset_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<EmbeddingCollection, ProviderError>> {
		Box::pin(async move {
			let fetched = sift_providers::dataset::fetch_collection(&self.cfg, dataset_id).await;

			fetched.map_err(|err| match err {
				sift_providers::Error::DatasetNotFound { dataset_id } =>
					ProviderError::DatasetNotFound { dataset_id },
				err => ProviderError::Unavailable { message: err.to_string() },
			})
		})
	}
}

impl DatasetStorage for MemoryStore {
	fn load<'a>(
		&'a self,
		dataset_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<EmbeddingCollection, ProviderError>> {
		Box::pin(async move {
			self.get(dataset_id)
				.map(|collection| collection.as_ref().clone())
				.map_err(|err| storage_error(err, dataset_id))
		})
	}
}

impl DatasetStorage for JsonDirStore {
	fn load<'a>(
		&'a self,
		dataset_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<EmbeddingCollection, ProviderError>> {
		Box::pin(async move {
			JsonDirStore::load(self, dataset_id).await.map_err(|err| storage_error(err, dataset_id))
		})
	}
}

fn storage_error(err: sift_storage::Error, dataset_id: &str) -> ProviderError {
	match err {
		sift_storage::Error::NotFound(_) =>
			ProviderError::DatasetNotFound { dataset_id: dataset_id.to_string() },
		sift_storage::Error::InvalidArgument(message) => ProviderError::InvalidRequest { message },
		err => ProviderError::Unavailable { message: err.to_string() },
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub storage: Arc<dyn DatasetStorage>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, storage: Arc<dyn DatasetStorage>) -> Self {
		Self { embedding, storage }
	}

	/// HTTP collaborators from `[providers.embedding]` and `[storage.dataset]`.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let embedding = cfg.providers.embedding.clone().ok_or_else(|| {
			Error::InvalidConfiguration {
				message: "providers.embedding must be configured.".to_string(),
			}
		})?;
		let storage = cfg.storage.dataset.clone().ok_or_else(|| Error::InvalidConfiguration {
			message: "storage.dataset must be configured.".to_string(),
		})?;

		Ok(Self::new(
			Arc::new(HttpEmbeddingProvider::new(embedding)),
			Arc::new(HttpDatasetStorage::new(storage)),
		))
	}
}

/// The search engine. Construct once and share behind an `Arc`.
pub struct SiftService {
	pub cfg: Config,
	pub providers: Providers,
	pub(crate) indexes: IndexRegistry,
	pub(crate) cache: Arc<IntelligentCache>,
	pub(crate) monitor: SearchMonitor,
	pub(crate) weights: RwLock<ScoringWeights>,
	pub(crate) diversification: RwLock<DiversificationConfig>,
	pub(crate) advanced: AdvancedRelevanceStrategy,
}
impl SiftService {
	pub fn new(cfg: Config, providers: Providers) -> Result<Self> {
		sift_config::validate(&cfg)?;

		let cache = Arc::new(IntelligentCache::new(cfg.cache.clone()));
		let monitor = SearchMonitor::new(&cfg.monitor);
		let weights = RwLock::new(cfg.scoring.weights);
		let diversification = RwLock::new(cfg.diversity.clone());
		let advanced = AdvancedRelevanceStrategy::new(cfg.scoring.relevance.clone());

		Ok(Self {
			cfg,
			providers,
			indexes: IndexRegistry::default(),
			cache,
			monitor,
			weights,
			diversification,
			advanced,
		})
	}

	/// Starts the periodic purge of expired cache entries on the current tokio runtime.
	pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
		cache::spawn_sweeper(self.cache.clone())
	}

	pub(crate) fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.service.request_timeout_ms)
	}

	pub(crate) fn balanced(&self) -> BalancedScoringStrategy {
		BalancedScoringStrategy::new(*self.weights.read())
	}
}

pub(crate) fn embedding_error(err: ProviderError) -> Error {
	match err {
		ProviderError::ModelNotFound { model } => Error::EmbeddingModelNotFound { model },
		ProviderError::InvalidRequest { message } => Error::InvalidRequest { message },
		ProviderError::DatasetNotFound { dataset_id } => Error::DatasetNotFound { dataset_id },
		ProviderError::Generation { message } | ProviderError::Unavailable { message } =>
			Error::EmbeddingGenerationFailed { message },
	}
}

pub(crate) fn storage_load_error(err: ProviderError) -> Error {
	match err {
		ProviderError::DatasetNotFound { dataset_id } => Error::DatasetNotFound { dataset_id },
		ProviderError::InvalidRequest { message } => Error::InvalidRequest { message },
		ProviderError::ModelNotFound { model } => Error::EmbeddingModelNotFound { model },
		ProviderError::Generation { message } | ProviderError::Unavailable { message } =>
			Error::IndexUnavailable { message },
	}
}
