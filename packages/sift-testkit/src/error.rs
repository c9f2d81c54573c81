pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),

	#[error(transparent)]
	Domain(#[from] sift_domain::Error),

	#[error(transparent)]
	Service(#[from] sift_service::Error),
}
