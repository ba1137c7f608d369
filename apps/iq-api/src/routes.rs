use axum::{
	Json, Router,
	body::Bytes,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use iq_service::{
	ChatRequest, ChatResponse, Error, HealthResponse, IngestRequest, IngestResponse,
	ResearchRequest, ResearchResponse,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/ingest", post(ingest))
		.route("/v1/chat", post(chat))
		.route("/v1/research", post(research))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(state.service.health().await)
}

// The body is optional; an empty POST means a regular, non-forced ingest.
async fn ingest(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
	let payload = if body.iter().all(u8::is_ascii_whitespace) {
		IngestRequest::default()
	} else {
		serde_json::from_slice(&body).map_err(|err| {
			json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_request", err.to_string(), None)
		})?
	};
	let response = state.service.ingest(payload).await?;

	Ok(Json(response))
}

async fn chat(
	State(state): State<AppState>,
	payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
	let Json(payload) = payload?;
	let cancel = state.shutdown.child_token();
	let response = state.service.chat_with_cancel(payload, &cancel).await?;

	Ok(Json(response))
}

async fn research(
	State(state): State<AppState>,
	payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<ResearchResponse>, ApiError> {
	let Json(payload) = payload?;
	let cancel = state.shutdown.child_token();
	let response = state.service.research_with_cancel(payload, &cancel).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();
		let fields = match &err {
			Error::InvalidRequest { fields, .. } if !fields.is_empty() => Some(fields.clone()),
			_ => None,
		};
		let (status, code) = match &err {
			Error::InvalidRequest { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request"),
			Error::NoCandidatesIndexed =>
				(StatusCode::SERVICE_UNAVAILABLE, "no_candidates_indexed"),
			Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			Error::DependencyUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "dependency_unavailable"),
			Error::Embedding { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_failed"),
			Error::Completion { .. } => (StatusCode::BAD_GATEWAY, "completion_failed"),
			Error::MalformedModelOutput { .. } =>
				(StatusCode::BAD_GATEWAY, "malformed_model_output"),
		};

		if status.is_server_error() {
			tracing::error!(error_code = code, error = %message, "Request failed.");
		} else {
			tracing::warn!(error_code = code, error = %message, "Request rejected.");
		}

		json_error(status, code, message, fields)
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		tracing::warn!(error = %rejection.body_text(), "Malformed request body.");

		json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_request", rejection.body_text(), None)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
