use std::path::{Path, PathBuf};

use crate::{Error, Result};
use sift_domain::EmbeddingCollection;

/// Datasets stored as `<root>/<dataset_id>.json`, one serialized collection per file.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
	root: PathBuf,
}
impl JsonDirStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn path_for(&self, dataset_id: &str) -> Result<PathBuf> {
		crate::validate_dataset_id(dataset_id)?;

		Ok(self.root.join(format!("{dataset_id}.json")))
	}

	pub async fn load(&self, dataset_id: &str) -> Result<EmbeddingCollection> {
		let path = self.path_for(dataset_id)?;
		let raw = match tokio::fs::read(&path).await {
			Ok(raw) => raw,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound =>
				return Err(Error::NotFound(dataset_id.to_string())),
			Err(err) => return Err(Error::Io { path, source: err }),
		};
		let collection: EmbeddingCollection = serde_json::from_slice(&raw)
			.map_err(|err| Error::Decode { path: path.clone(), source: err })?;

		if collection.dataset_id() != dataset_id {
			return Err(Error::InvalidArgument(format!(
				"File {path:?} holds dataset {:?}, expected {dataset_id:?}.",
				collection.dataset_id()
			)));
		}

		tracing::debug!(dataset_id, items = collection.len(), "Loaded dataset file.");

		Ok(collection)
	}

	pub async fn save(&self, collection: &EmbeddingCollection) -> Result<PathBuf> {
		let path = self.path_for(collection.dataset_id())?;
		let payload = serde_json::to_vec_pretty(collection)
			.map_err(|err| Error::Decode { path: path.clone(), source: err })?;

		tokio::fs::create_dir_all(&self.root)
			.await
			.map_err(|err| Error::Io { path: self.root.clone(), source: err })?;
		tokio::fs::write(&path, payload)
			.await
			.map_err(|err| Error::Io { path: path.clone(), source: err })?;

		Ok(path)
	}
}
