use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Dataset not found: {0}")]
	NotFound(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Failed to access {path:?}: {source}")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("Failed to decode {path:?}: {source}")]
	Decode { path: PathBuf, source: serde_json::Error },
	#[error(transparent)]
	Domain(#[from] sift_domain::Error),
}
