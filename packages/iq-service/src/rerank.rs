use std::collections::HashSet;

use crate::{
	CompletionClient, CompletionRequest,
	llm_json::{self, ModelReply},
};
use iq_domain::{CandidateMatch, text::truncate_chars};

const RERANK_MAX_TOKENS: u32 = 200;
const RERANK_TEMPERATURE: f32 = 0.3;
const SUMMARY_SKILLS_CHARS: usize = 80;

/// Ordering used when the model cannot produce a usable selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankFallback {
	/// Keep the order the candidates arrived in.
	InputOrder,
	/// Highest similarity first.
	ByScore,
}

pub struct RerankerService<'a> {
	client: CompletionClient<'a>,
}
impl<'a> RerankerService<'a> {
	pub fn new(client: CompletionClient<'a>) -> Self {
		Self { client }
	}

	/// Never fails; at most `top_k` candidates come back.
	pub async fn rerank(
		&self,
		query: &str,
		candidates: Vec<CandidateMatch>,
		top_k: usize,
		fallback: RerankFallback,
	) -> Vec<CandidateMatch> {
		if candidates.is_empty() || top_k == 0 {
			return Vec::new();
		}

		let request = CompletionRequest::new(
			build_rerank_prompt(query, &candidates, top_k),
			RERANK_MAX_TOKENS,
			RERANK_TEMPERATURE,
		);
		let reply = match self.client.complete(&request).await {
			Ok(raw) => llm_json::parse_reply::<Vec<f64>>(&raw),
			Err(err) => ModelReply::fallback(err.to_string()),
		};
		let selection = match reply {
			ModelReply::Parsed(indices) => select_indices(&indices, candidates.len(), top_k),
			ModelReply::Fallback { reason } => {
				tracing::warn!(reason = %reason, "Reranking failed. Using fallback order.");

				return apply_fallback(candidates, top_k, fallback);
			},
		};

		if selection.is_empty() {
			tracing::warn!("Reranker selected no valid candidates. Using fallback order.");

			return apply_fallback(candidates, top_k, fallback);
		}

		let mut slots = candidates.into_iter().map(Some).collect::<Vec<_>>();

		selection.into_iter().filter_map(|index| slots[index].take()).collect()
	}
}

pub fn build_rerank_prompt(query: &str, candidates: &[CandidateMatch], top_k: usize) -> String {
	let summaries = candidates
		.iter()
		.enumerate()
		.map(|(i, candidate)| {
			let attrs = &candidate.attributes;

			format!(
				"{}. {} | {} | {}, {} | {} yrs | skills: {}",
				i + 1,
				attrs.name,
				attrs.current_title,
				attrs.city,
				attrs.country,
				attrs.years_of_experience,
				truncate_chars(&attrs.skills, SUMMARY_SKILLS_CHARS)
			)
		})
		.collect::<Vec<_>>()
		.join("\n");

	format!(
		"You are ranking candidates for a search query.
Pick the {top_k} best matches strictly against the user input. Return ONLY a JSON array of their numbers.
Example: [3, 1, 7, 2, 5]

Query: \"{query}\"

Candidates:
{summaries}

Best {top_k} (as JSON array of numbers):"
	)
}

/// Maps 1-based model indices to 0-based positions: out-of-range and repeated entries are
/// dropped, and the result is capped at `top_k`.
pub fn select_indices(indices: &[f64], len: usize, top_k: usize) -> Vec<usize> {
	let mut seen = HashSet::new();

	indices
		.iter()
		.filter(|index| index.fract() == 0.0 && **index >= 1.0 && **index <= len as f64)
		.map(|index| *index as usize - 1)
		.filter(|index| seen.insert(*index))
		.take(top_k)
		.collect()
}

pub fn apply_fallback(
	mut candidates: Vec<CandidateMatch>,
	top_k: usize,
	fallback: RerankFallback,
) -> Vec<CandidateMatch> {
	if fallback == RerankFallback::ByScore {
		candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
	}

	candidates.truncate(top_k);

	candidates
}
