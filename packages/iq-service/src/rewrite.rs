use crate::{CompletionClient, CompletionRequest, session::Turn};

const REWRITE_MAX_TOKENS: u32 = 150;
const REWRITE_TEMPERATURE: f32 = 0.2;

/// Expands `query` with synonyms and domain, location, and language terms. Returns `query`
/// unchanged when the model fails or says nothing.
pub async fn rewrite_query(client: CompletionClient<'_>, query: &str, history: &[Turn]) -> String {
	let request =
		CompletionRequest::new(build_rewrite_prompt(query, history), REWRITE_MAX_TOKENS, REWRITE_TEMPERATURE);

	match client.complete(&request).await {
		Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
		Ok(_) => query.to_string(),
		Err(err) => {
			tracing::warn!(error = %err, "Query rewrite failed. Using the original query.");

			query.to_string()
		},
	}
}

pub fn build_rewrite_prompt(query: &str, history: &[Turn]) -> String {
	let history_block = if history.is_empty() {
		String::new()
	} else {
		let lines = history
			.iter()
			.map(|turn| format!("{}: {}", turn.role.label(), turn.content))
			.collect::<Vec<_>>()
			.join("\n");

		format!("Conversation history:\n{lines}\n")
	};

	format!(
		"Rewrite this candidate search query to improve vector search retrieval.
Add skill synonyms, industry terms, and the location of the candidates. Use the conversation history for language or location context when it is relevant.

{history_block}
Query: {query}

Rewritten:"
	)
}
