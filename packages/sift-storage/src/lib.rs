pub mod file;
pub mod memory;

mod error;

pub use error::Error;
pub use file::JsonDirStore;
pub use memory::MemoryStore;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Dataset ids become file names, so only a conservative character set is accepted.
pub fn validate_dataset_id(dataset_id: &str) -> Result<()> {
	let valid = !dataset_id.is_empty()
		&& dataset_id.len() <= 128
		&& dataset_id.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
		&& !dataset_id.starts_with('.');

	if !valid {
		return Err(Error::InvalidArgument(format!("Invalid dataset id {dataset_id:?}.")));
	}

	Ok(())
}
