use crate::{CompletionClient, CompletionRequest};
use iq_domain::CandidateMatch;

const SUMMARY_MAX_TOKENS: u32 = 100;
const SUMMARY_TEMPERATURE: f32 = 0.4;
const SUMMARY_NAMES: usize = 5;

pub struct SummaryGenerator<'a> {
	client: CompletionClient<'a>,
}
impl<'a> SummaryGenerator<'a> {
	pub fn new(client: CompletionClient<'a>) -> Self {
		Self { client }
	}

	pub async fn summarize(&self, query: &str, candidates: &[CandidateMatch]) -> String {
		let request = CompletionRequest::new(
			build_summary_prompt(query, candidates),
			SUMMARY_MAX_TOKENS,
			SUMMARY_TEMPERATURE,
		);

		match self.client.complete(&request).await {
			Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
			Ok(_) => {
				tracing::warn!("Summary reply was empty. Using fallback text.");

				fallback_summary(candidates.len())
			},
			Err(err) => {
				tracing::warn!(error = %err, "Summary generation failed. Using fallback text.");

				fallback_summary(candidates.len())
			},
		}
	}
}

pub fn fallback_summary(count: usize) -> String {
	format!("Found {count} candidates matching your search.")
}

fn build_summary_prompt(query: &str, candidates: &[CandidateMatch]) -> String {
	let names = candidates
		.iter()
		.take(SUMMARY_NAMES)
		.map(|candidate| candidate.attributes.name.as_str())
		.collect::<Vec<_>>()
		.join(", ");

	format!(
		"Search: \"{query}\". Top results: {names}. Write 2 sentences summarising why these candidates are relevant. Plain text only."
	)
}
