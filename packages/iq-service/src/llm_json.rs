//! Strict parsing of model replies. A reply either deserializes into the expected shape or is
//! reported as a fallback with the reason; nothing in between is guessed at.

use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply<T> {
	Parsed(T),
	Fallback { reason: String },
}
impl<T> ModelReply<T> {
	pub fn fallback(reason: impl Into<String>) -> Self {
		Self::Fallback { reason: reason.into() }
	}

	pub fn parsed(self) -> Option<T> {
		match self {
			Self::Parsed(value) => Some(value),
			Self::Fallback { .. } => None,
		}
	}
}

/// Returns the body of the first fenced block when the reply uses Markdown fences.
pub fn strip_code_fences(raw: &str) -> &str {
	let trimmed = raw.trim();
	let mut parts = trimmed.split("```");

	match (parts.next(), parts.next()) {
		(Some(_), Some(fenced)) => {
			let fenced = fenced.trim_start();

			fenced.strip_prefix("json").unwrap_or(fenced).trim()
		},
		_ => trimmed,
	}
}

pub fn parse_reply<T>(raw: &str) -> ModelReply<T>
where
	T: DeserializeOwned,
{
	let body = strip_code_fences(raw);

	if body.is_empty() {
		return ModelReply::fallback("Model reply is empty.");
	}

	match serde_json::from_str(body) {
		Ok(value) => ModelReply::Parsed(value),
		Err(err) => ModelReply::fallback(format!("Model reply is not valid JSON: {err}.")),
	}
}
