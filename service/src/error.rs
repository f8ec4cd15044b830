use stats::StatsError;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
	#[error("NOT_FOUND")]
	NotFound,
	#[error(transparent)]
	Stats(#[from] StatsError),
	#[error(transparent)]
	Store(#[from] StoreError),
}

impl ServiceError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound)
	}
}
