use futures_util::future;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
	CompletionClient, CompletionRequest, ConcurrencyLimiter,
	llm_json::{self, ModelReply},
};
use iq_domain::{CandidateAttributes, CandidateMatch, text::truncate_chars};

/// Outstanding explanation calls per request.
pub const ENRICHMENT_CONCURRENCY: usize = 3;

const EXPLAIN_MAX_TOKENS: u32 = 250;
const EXPLAIN_TEMPERATURE: f32 = 0.3;
const PROMPT_SKILLS_CHARS: usize = 200;
const HIGHLIGHT_SKILLS_CHARS: usize = 80;

#[derive(Debug, Deserialize)]
struct Explanation {
	why_match: String,
	#[serde(default)]
	highlights: Vec<String>,
}

/// Attaches `why_match` and `highlights` to each candidate, calling the model for at most
/// `ENRICHMENT_CONCURRENCY` candidates at a time.
pub struct EnrichmentPipeline<'a> {
	client: CompletionClient<'a>,
	limiter: ConcurrencyLimiter,
}
impl<'a> EnrichmentPipeline<'a> {
	pub fn new(client: CompletionClient<'a>) -> Self {
		Self::with_limiter(client, ConcurrencyLimiter::new(ENRICHMENT_CONCURRENCY))
	}

	pub fn with_limiter(client: CompletionClient<'a>, limiter: ConcurrencyLimiter) -> Self {
		Self { client, limiter }
	}

	/// Output order matches input order. Every candidate comes back enriched, by the model or by
	/// the deterministic fallback.
	pub async fn enrich(
		&self,
		query: &str,
		candidates: Vec<CandidateMatch>,
		cancel: &CancellationToken,
	) -> Vec<CandidateMatch> {
		let tasks = candidates.into_iter().map(|candidate| self.enrich_one(query, candidate, cancel));
		let enriched = future::join_all(tasks).await;

		tracing::info!(count = enriched.len(), "Candidate explanations attached.");

		enriched
	}

	async fn enrich_one(
		&self,
		query: &str,
		mut candidate: CandidateMatch,
		cancel: &CancellationToken,
	) -> CandidateMatch {
		let permit = tokio::select! {
			biased;
			_ = cancel.cancelled() => None,
			permit = self.limiter.acquire() => permit,
		};
		let Some(_permit) = permit else {
			apply_fallback(&mut candidate);

			return candidate;
		};
		let request = CompletionRequest::new(
			build_explain_prompt(query, &candidate),
			EXPLAIN_MAX_TOKENS,
			EXPLAIN_TEMPERATURE,
		);
		let reply = tokio::select! {
			biased;
			_ = cancel.cancelled() => ModelReply::fallback("Request cancelled."),
			result = self.client.complete(&request) => match result {
				Ok(raw) => parse_explanation(&raw),
				Err(err) => ModelReply::fallback(err.to_string()),
			},
		};

		match reply {
			ModelReply::Parsed((why_match, highlights)) => {
				candidate.why_match = Some(why_match);
				candidate.highlights = highlights;
			},
			ModelReply::Fallback { reason } => {
				tracing::warn!(
					candidate_id = %candidate.id,
					reason = %reason,
					"Explanation failed. Using fallback."
				);

				apply_fallback(&mut candidate);
			},
		}

		candidate
	}
}

/// `why_match` and highlights derived from attributes alone.
pub fn fallback_explanation(attributes: &CandidateAttributes) -> (String, Vec<String>) {
	let basis = [attributes.top_skills.as_str(), attributes.skills.as_str()]
		.into_iter()
		.find(|value| !value.is_empty())
		.unwrap_or("experience");

	(
		format!("Relevant based on {basis}."),
		vec![
			attributes.current_title.clone(),
			attributes.industry.clone(),
			truncate_chars(&attributes.skills, HIGHLIGHT_SKILLS_CHARS),
		],
	)
}

fn apply_fallback(candidate: &mut CandidateMatch) {
	let (why_match, highlights) = fallback_explanation(&candidate.attributes);

	candidate.why_match = Some(why_match);
	candidate.highlights = highlights;
}

fn parse_explanation(raw: &str) -> ModelReply<(String, Vec<String>)> {
	let explanation = match llm_json::parse_reply::<Explanation>(raw) {
		ModelReply::Parsed(explanation) => explanation,
		ModelReply::Fallback { reason } => return ModelReply::Fallback { reason },
	};
	let why_match = explanation.why_match.trim();

	if why_match.is_empty() {
		return ModelReply::fallback("Explanation has an empty why_match.");
	}

	let highlights = explanation
		.highlights
		.into_iter()
		.map(|highlight| highlight.trim().to_string())
		.filter(|highlight| !highlight.is_empty())
		.collect();

	ModelReply::Parsed((why_match.to_string(), highlights))
}

fn build_explain_prompt(query: &str, candidate: &CandidateMatch) -> String {
	let attrs = &candidate.attributes;

	format!(
		"You are writing search results for an expert network.

Search query: \"{query}\"

Candidate:
- Name: {name}
- Title: {title} at {company}
- Location: {city}, {country}
- Industry: {industry}
- Years of experience: {years}
- Skills: {skills}
- Top skills: {top_skills}
- Education: {education}
- Languages: {languages}

Return JSON only:
{{\"why_match\": \"<one sentence why this person matches the query>\", \"highlights\": [\"<fact 1>\", \"<fact 2>\", \"<fact 3>\"]}}",
		name = attrs.name,
		title = attrs.current_title,
		company = attrs.current_company,
		city = attrs.city,
		country = attrs.country,
		industry = attrs.industry,
		years = attrs.years_of_experience,
		skills = truncate_chars(&attrs.skills, PROMPT_SKILLS_CHARS),
		top_skills = attrs.top_skills,
		education = attrs.education,
		languages = attrs.languages,
	)
}
