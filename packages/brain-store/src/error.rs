pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Store backend error: {message}")]
	Backend { message: String },
	#[error("Store row is malformed: {message}")]
	Corrupt { message: String },
}
