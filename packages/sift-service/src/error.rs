use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Transport-neutral status class of an error, for calling layers that map to HTTP or similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
	NotFound,
	InvalidRequest,
	Unavailable,
	Internal,
}
impl ErrorStatus {
	pub fn http_code(self) -> u16 {
		match self {
			Self::NotFound => 404,
			Self::InvalidRequest => 400,
			Self::Unavailable => 503,
			Self::Internal => 500,
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Dataset {dataset_id:?} was not found.")]
	DatasetNotFound { dataset_id: String },
	#[error("Query must not be empty.")]
	EmptyQuery,
	#[error("Invalid search type {search_type:?}, expected semantic, keyword, or hybrid.")]
	InvalidSearchType { search_type: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Embedding model {model:?} was not found.")]
	EmbeddingModelNotFound { model: String },
	#[error("Embedding generation failed: {message}")]
	EmbeddingGenerationFailed { message: String },
	#[error("Index unavailable: {message}")]
	IndexUnavailable { message: String },
	#[error("Search execution failed: {message}")]
	SearchExecutionFailed { message: String },
	#[error("Invalid configuration: {message}")]
	InvalidConfiguration { message: String },
	#[error("No quality report for search {search_id}.")]
	SearchNotFound { search_id: Uuid },
}
impl Error {
	pub fn status(&self) -> ErrorStatus {
		match self {
			Self::DatasetNotFound { .. }
			| Self::EmbeddingModelNotFound { .. }
			| Self::SearchNotFound { .. } => ErrorStatus::NotFound,
			Self::EmptyQuery
			| Self::InvalidSearchType { .. }
			| Self::InvalidRequest { .. }
			| Self::InvalidConfiguration { .. } => ErrorStatus::InvalidRequest,
			Self::EmbeddingGenerationFailed { .. } | Self::IndexUnavailable { .. } =>
				ErrorStatus::Unavailable,
			Self::SearchExecutionFailed { .. } => ErrorStatus::Internal,
		}
	}

	/// Stable machine-readable identifier.
	pub fn code(&self) -> &'static str {
		match self {
			Self::DatasetNotFound { .. } => "DATASET_NOT_FOUND",
			Self::EmptyQuery => "EMPTY_QUERY",
			Self::InvalidSearchType { .. } => "INVALID_SEARCH_TYPE",
			Self::InvalidRequest { .. } => "INVALID_REQUEST",
			Self::EmbeddingModelNotFound { .. } => "EMBEDDING_MODEL_NOT_FOUND",
			Self::EmbeddingGenerationFailed { .. } => "EMBEDDING_GENERATION_FAILED",
			Self::IndexUnavailable { .. } => "INDEX_UNAVAILABLE",
			Self::SearchExecutionFailed { .. } => "SEARCH_EXECUTION_FAILED",
			Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
			Self::SearchNotFound { .. } => "SEARCH_NOT_FOUND",
		}
	}
}
impl From<sift_config::Error> for Error {
	fn from(err: sift_config::Error) -> Self {
		Self::InvalidConfiguration { message: err.to_string() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn statuses_map_to_distinct_http_codes() {
		let cases = [
			(Error::DatasetNotFound { dataset_id: "d".to_string() }, 404),
			(Error::EmptyQuery, 400),
			(Error::InvalidSearchType { search_type: "x".to_string() }, 400),
			(Error::InvalidConfiguration { message: "m".to_string() }, 400),
			(Error::EmbeddingGenerationFailed { message: "m".to_string() }, 503),
			(Error::IndexUnavailable { message: "m".to_string() }, 503),
			(Error::SearchExecutionFailed { message: "m".to_string() }, 500),
		];

		for (err, code) in cases {
			assert_eq!(err.status().http_code(), code, "{}", err.code());
		}
	}
}
