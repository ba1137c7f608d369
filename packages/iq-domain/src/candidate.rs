use serde::{Deserialize, Serialize};

use crate::text::truncate_chars;

const MAX_EDUCATION_CHARS: usize = 400;

/// One flattened row from the source of record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
	pub id: String,
	pub name: String,
	pub headline: Option<String>,
	pub email: Option<String>,
	pub years_of_experience: Option<i32>,
	pub city: Option<String>,
	pub country: Option<String>,
	pub current_title: Option<String>,
	pub current_company: Option<String>,
	pub industry: Option<String>,
	pub skills: Option<String>,
	/// Skills held at expert proficiency.
	pub top_skills: Option<String>,
	pub education: Option<String>,
	pub languages: Option<String>,
	pub work_history: Option<String>,
	pub job_description: Option<String>,
}

/// The attribute mapping stored next to each vector. Unknown text fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateAttributes {
	pub name: String,
	pub headline: String,
	pub current_title: String,
	pub current_company: String,
	pub industry: String,
	pub city: String,
	pub country: String,
	pub years_of_experience: i64,
	pub skills: String,
	pub top_skills: String,
	pub education: String,
	pub languages: String,
	pub email: String,
}
impl CandidateAttributes {
	pub fn from_profile(profile: &CandidateProfile) -> Self {
		fn owned(value: &Option<String>) -> String {
			value.clone().unwrap_or_default()
		}

		Self {
			name: profile.name.clone(),
			headline: owned(&profile.headline),
			current_title: owned(&profile.current_title),
			current_company: owned(&profile.current_company),
			industry: owned(&profile.industry),
			city: owned(&profile.city),
			country: owned(&profile.country),
			years_of_experience: profile.years_of_experience.map(i64::from).unwrap_or(0),
			skills: owned(&profile.skills),
			top_skills: owned(&profile.top_skills),
			education: truncate_chars(
				profile.education.as_deref().unwrap_or(""),
				MAX_EDUCATION_CHARS,
			),
			languages: owned(&profile.languages),
			email: owned(&profile.email),
		}
	}

	/// `City, Country`, skipping whichever part is missing.
	pub fn location(&self) -> String {
		[self.city.as_str(), self.country.as_str()]
			.into_iter()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(", ")
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
	pub id: String,
	/// Similarity in `[0, 1]`; higher is more relevant.
	pub score: f32,
	pub attributes: CandidateAttributes,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub why_match: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub highlights: Vec<String>,
}
impl CandidateMatch {
	pub fn new(id: impl Into<String>, score: f32, attributes: CandidateAttributes) -> Self {
		Self { id: id.into(), score, attributes, why_match: None, highlights: Vec::new() }
	}

	/// Short human-readable label, e.g. `Jane Doe (Regulatory Manager, Riyadh, Saudi Arabia)`.
	pub fn descriptor(&self) -> String {
		let details = [
			self.attributes.current_title.as_str(),
			self.attributes.city.as_str(),
			self.attributes.country.as_str(),
		]
		.into_iter()
		.filter(|part| !part.is_empty())
		.collect::<Vec<_>>();
		let name = if self.attributes.name.is_empty() {
			self.id.as_str()
		} else {
			self.attributes.name.as_str()
		};

		if details.is_empty() { name.to_string() } else { format!("{name} ({})", details.join(", ")) }
	}
}

/// Equality predicate over keyword attributes, applied inside the vector index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
	pub country: Option<String>,
	pub city: Option<String>,
	pub industry: Option<String>,
}
impl SearchFilter {
	pub fn is_empty(&self) -> bool {
		self.country.is_none() && self.city.is_none() && self.industry.is_none()
	}

	/// Field name and expected value for every populated constraint.
	pub fn conditions(&self) -> Vec<(&'static str, &str)> {
		[("country", &self.country), ("city", &self.city), ("industry", &self.industry)]
			.into_iter()
			.filter_map(|(field, value)| value.as_deref().map(|value| (field, value)))
			.collect()
	}
}
