pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error(transparent)]
	Domain(#[from] sift_domain::Error),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Embedding model {model:?} is not available.")]
	ModelNotFound { model: String },
	#[error("Dataset {dataset_id:?} does not exist.")]
	DatasetNotFound { dataset_id: String },
}
impl Error {
	/// Transport-level failures worth reporting as an unavailable collaborator.
	pub fn is_unavailable(&self) -> bool {
		match self {
			Self::Reqwest(err) =>
				err.is_timeout()
					|| err.is_connect()
					|| err.status().is_some_and(|status| status.is_server_error()),
			_ => false,
		}
	}
}
