pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest {
		message: String,
		/// Request fields that failed validation; empty when not tied to a field.
		fields: Vec<String>,
	},
	#[error("No candidates indexed yet. Run POST /v1/ingest first.")]
	NoCandidatesIndexed,
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Dependency unavailable: {message}")]
	DependencyUnavailable { message: String },
	#[error("Embedding failed: {message}")]
	Embedding { message: String },
	#[error("Completion failed: {message}")]
	Completion { message: String },
	#[error("Malformed model output: {message}")]
	MalformedModelOutput { message: String },
}
impl From<iq_storage::Error> for Error {
	fn from(err: iq_storage::Error) -> Self {
		match err {
			iq_storage::Error::Sqlx(inner) =>
				Self::DependencyUnavailable { message: format!("Postgres: {inner}") },
			iq_storage::Error::Qdrant(inner) =>
				Self::DependencyUnavailable { message: format!("Qdrant: {inner}") },
			iq_storage::Error::InvalidArgument(message) =>
				Self::InvalidRequest { message, fields: Vec::new() },
		}
	}
}

impl Error {
	pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into(), fields: vec![field.to_string()] }
	}
}
