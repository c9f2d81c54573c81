pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding {id} has dimension {actual}, collection dimension is {expected}.")]
	DimensionMismatch { id: String, expected: usize, actual: usize },
	#[error("Embedding {id} has an empty vector.")]
	EmptyVector { id: String },
	#[error("Unknown search type {value:?}.")]
	UnknownSearchType { value: String },
}
