use serde::{Deserialize, Serialize};

use iq_domain::CandidateMatch;

/// Candidate as returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
	pub id: String,
	pub name: String,
	pub headline: Option<String>,
	pub current_title: Option<String>,
	pub current_company: Option<String>,
	/// `City, Country`.
	pub location: Option<String>,
	pub industry: Option<String>,
	pub years_of_experience: Option<i64>,
	pub skills: Option<String>,
	pub languages: Option<String>,
	pub education: Option<String>,
	pub relevance_score: f32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub why_match: Option<String>,
	#[serde(default)]
	pub highlights: Vec<String>,
}
impl From<&CandidateMatch> for CandidateResult {
	fn from(candidate: &CandidateMatch) -> Self {
		let attrs = &candidate.attributes;

		Self {
			id: candidate.id.clone(),
			name: attrs.name.clone(),
			headline: non_empty(&attrs.headline),
			current_title: non_empty(&attrs.current_title),
			current_company: non_empty(&attrs.current_company),
			location: non_empty(&attrs.location()),
			industry: non_empty(&attrs.industry),
			years_of_experience: Some(attrs.years_of_experience).filter(|years| *years > 0),
			skills: non_empty(&attrs.skills),
			languages: non_empty(&attrs.languages),
			education: non_empty(&attrs.education),
			relevance_score: candidate.score,
			why_match: candidate.why_match.clone(),
			highlights: candidate
				.highlights
				.iter()
				.filter(|highlight| !highlight.is_empty())
				.cloned()
				.collect(),
		}
	}
}

fn non_empty(value: &str) -> Option<String> {
	if value.is_empty() { None } else { Some(value.to_string()) }
}
